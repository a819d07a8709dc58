pub mod ticket_code;
