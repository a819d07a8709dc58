//! Database access seam for [`kanau::processor::Processor`] impls.
//!
//! Entity operations are expressed as `Processor<Query>` impls over a
//! [`DatabaseProcessor`] (pool-backed, one statement per call) or run
//! against an open [`sqlx::Transaction`] when several statements must
//! commit together (reservation + ticket insert, verification commit).

use sqlx::PgPool;

/// Pool-backed accessor for single-statement operations.
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}
