//! Ticket verification state machine.
//!
//! A scan runs an ordered list of named gates over a shared context; the
//! first failing gate terminates verification with a specific deny
//! reason, and the trail of every evaluated gate is returned for support
//! and audit. Gate order is a contract: a ticket that is both unpaid and
//! presented on the wrong day must deny `UNPAID`, because the payment
//! gate runs before the date gate.
//!
//! The final commit is a compare-and-set status transition, so two
//! simultaneous scans of the same code yield exactly one ADMIT and one
//! DENY(`ALREADY_USED`).

use crate::entities::ticket::{GetTicketForScan, Ticket, TicketForScan};
use crate::entities::{PaymentStatus, TicketStatus};
use crate::entities::attendee::Attendee;
use crate::framework::DatabaseProcessor;
use compact_str::CompactString;
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;
use tixgate_sdk::objects::verify::{DenyReason, GateCheck, GateName, ScanOutcome};

/// Minimum length of a sanitized code; anything shorter is rejected
/// before touching the database.
pub const MIN_CODE_LEN: usize = 8;

/// Default early-entry lead: holders may enter up to two hours before the
/// session starts.
pub const DEFAULT_EARLY_ENTRY_MINUTES: i64 = 120;

/// Timezone and time-window policy for gate checks.
#[derive(Debug, Clone, Copy)]
pub struct GatePolicy {
    /// Service timezone; "today" at the venue is decided in this offset.
    pub utc_offset: time::UtcOffset,
    /// How early before session start a holder may be admitted.
    pub early_entry: time::Duration,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            utc_offset: time::UtcOffset::UTC,
            early_entry: time::Duration::minutes(DEFAULT_EARLY_ENTRY_MINUTES),
        }
    }
}

/// Errors that can occur during a scan (gate denials are not errors; they
/// are a normal [`ScanOutcome`]).
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Normalize raw scanner input: trim whitespace, strip a URL prefix when
/// a full link was scanned, and reject anything too short to be a code.
pub fn sanitize_code(raw: &str) -> Option<CompactString> {
    let trimmed = raw.trim();
    let code = if trimmed.contains("://") {
        // A full link was scanned; the code is the last non-empty path
        // segment. A URL with no path segments carries no code.
        let parsed = url::Url::parse(trimmed).ok()?;
        let segment = parsed.path_segments()?.rev().find(|seg| !seg.is_empty())?;
        CompactString::from(segment.trim())
    } else {
        CompactString::from(trimmed)
    };
    if code.len() < MIN_CODE_LEN {
        return None;
    }
    Some(code)
}

/// Result of evaluating the pure gates (payment, date, time window,
/// usage) over a looked-up ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateEvaluation {
    pub trail: Vec<GateCheck>,
    /// `None` when every gate passed; otherwise the first failure.
    pub denial: Option<(GateName, DenyReason)>,
}

/// Evaluate the ordered pure gates against a ticket snapshot.
///
/// `now_local` must already be in the service timezone. This function has
/// no side effects; the caller appends the commit gate.
pub fn evaluate_gates(
    ticket: &TicketForScan,
    now_local: time::OffsetDateTime,
    early_entry: time::Duration,
) -> GateEvaluation {
    let mut trail = Vec::with_capacity(4);

    // Gate: payment. Must be settled before anything date-related.
    if ticket.payment_status != PaymentStatus::Paid {
        trail.push(GateCheck {
            gate: GateName::Payment,
            passed: false,
            detail: format!("payment status is {:?}, not paid", ticket.payment_status),
        });
        return GateEvaluation {
            trail,
            denial: Some((GateName::Payment, DenyReason::Unpaid)),
        };
    }
    trail.push(GateCheck {
        gate: GateName::Payment,
        passed: true,
        detail: "ticket is paid".to_string(),
    });

    // Gate: date. Venue-local today must be the session's day.
    let today = now_local.date();
    if today != ticket.held_on {
        trail.push(GateCheck {
            gate: GateName::Date,
            passed: false,
            detail: format!("ticket is for {}, today is {}", ticket.held_on, today),
        });
        return GateEvaluation {
            trail,
            denial: Some((GateName::Date, DenyReason::WrongDay)),
        };
    }
    trail.push(GateCheck {
        gate: GateName::Date,
        passed: true,
        detail: format!("valid for today ({today})"),
    });

    // Gate: time window. [start - early_entry, end], computed as
    // datetimes so an early window crossing midnight still compares
    // correctly.
    let session_start = time::PrimitiveDateTime::new(ticket.held_on, ticket.starts_at);
    let session_end = time::PrimitiveDateTime::new(ticket.held_on, ticket.ends_at);
    let window_start = session_start - early_entry;
    let now_dt = time::PrimitiveDateTime::new(now_local.date(), now_local.time());
    if now_dt < window_start || now_dt > session_end {
        trail.push(GateCheck {
            gate: GateName::TimeWindow,
            passed: false,
            detail: format!(
                "now {} is outside [{} - {}]",
                now_dt.time(),
                window_start.time(),
                session_end.time()
            ),
        });
        return GateEvaluation {
            trail,
            denial: Some((GateName::TimeWindow, DenyReason::WrongTime)),
        };
    }
    trail.push(GateCheck {
        gate: GateName::TimeWindow,
        passed: true,
        detail: format!("within entry window for session {}", ticket.session_name),
    });

    // Gate: usage. Paid tickets can still be spent (used) or withdrawn
    // (cancelled); either way they no longer admit.
    if ticket.status != TicketStatus::Active {
        trail.push(GateCheck {
            gate: GateName::Usage,
            passed: false,
            detail: format!("ticket status is {:?}", ticket.status),
        });
        return GateEvaluation {
            trail,
            denial: Some((GateName::Usage, DenyReason::AlreadyUsed)),
        };
    }
    trail.push(GateCheck {
        gate: GateName::Usage,
        passed: true,
        detail: "ticket not yet used".to_string(),
    });

    GateEvaluation {
        trail,
        denial: None,
    }
}

/// Gate-side verification engine: sanitizes, looks up, evaluates the
/// gates, and durably consumes the ticket.
pub struct VerificationEngine {
    pool: PgPool,
    policy: GatePolicy,
}

impl VerificationEngine {
    pub fn new(pool: PgPool, policy: GatePolicy) -> Self {
        Self { pool, policy }
    }

    /// Run a full scan for raw scanner input.
    #[tracing::instrument(skip(self), fields(raw_code = %raw_code))]
    pub async fn scan(&self, raw_code: &str) -> Result<ScanOutcome, VerifyError> {
        let now_local = time::OffsetDateTime::now_utc().to_offset(self.policy.utc_offset);
        self.scan_at(raw_code, now_local).await
    }

    /// Scan with an explicit "now", separated out so the date/time gates
    /// stay deterministic under test.
    pub async fn scan_at(
        &self,
        raw_code: &str,
        now_local: time::OffsetDateTime,
    ) -> Result<ScanOutcome, VerifyError> {
        let mut trail = Vec::new();

        // Gate: sanitize.
        let Some(code) = sanitize_code(raw_code) else {
            trail.push(GateCheck {
                gate: GateName::Sanitize,
                passed: false,
                detail: "scanned input is not a plausible ticket code".to_string(),
            });
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::MalformedCode,
                failed_gate: GateName::Sanitize,
                trail,
            });
        };
        trail.push(GateCheck {
            gate: GateName::Sanitize,
            passed: true,
            detail: format!("normalized to {code}"),
        });

        // Gate: lookup. Ticket, session and day must all resolve.
        let processor = DatabaseProcessor {
            pool: self.pool.clone(),
        };
        let Some(ticket) = processor
            .process(GetTicketForScan { code: code.clone() })
            .await?
        else {
            trail.push(GateCheck {
                gate: GateName::Lookup,
                passed: false,
                detail: format!("no ticket with code {code}"),
            });
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::NotFound,
                failed_gate: GateName::Lookup,
                trail,
            });
        };
        trail.push(GateCheck {
            gate: GateName::Lookup,
            passed: true,
            detail: format!("ticket {} in session {}", ticket.ticket_id, ticket.session_name),
        });

        // Pure gates.
        let evaluation = evaluate_gates(&ticket, now_local, self.policy.early_entry);
        trail.extend(evaluation.trail);
        if let Some((failed_gate, reason)) = evaluation.denial {
            tracing::info!(
                code = %code,
                gate = ?failed_gate,
                reason = ?reason,
                "Scan denied"
            );
            return Ok(ScanOutcome::Deny {
                reason,
                failed_gate,
                trail,
            });
        }

        // Gate: commit. Compare-and-set the USED transition and stamp the
        // attendee rows in one transaction; losing the CAS means another
        // scan admitted this code first.
        let verified_at = time::PrimitiveDateTime::new(now_local.date(), now_local.time());
        let mut tx = self.pool.begin().await?;
        let won = Ticket::mark_used_tx(&mut tx, ticket.ticket_id, verified_at).await?;
        if !won {
            tx.rollback().await?;
            trail.push(GateCheck {
                gate: GateName::Commit,
                passed: false,
                detail: "ticket was consumed by a concurrent scan".to_string(),
            });
            tracing::warn!(code = %code, "Lost verification commit race");
            return Ok(ScanOutcome::Deny {
                reason: DenyReason::AlreadyUsed,
                failed_gate: GateName::Commit,
                trail,
            });
        }
        Attendee::mark_all_used_tx(&mut tx, ticket.ticket_id, verified_at).await?;
        tx.commit().await?;

        trail.push(GateCheck {
            gate: GateName::Commit,
            passed: true,
            detail: "ticket marked used".to_string(),
        });
        tracing::info!(
            code = %code,
            ticket_id = %ticket.ticket_id,
            session = %ticket.session_name,
            "Scan admitted"
        );

        Ok(ScanOutcome::Admit {
            ticket_id: ticket.ticket_id,
            code: ticket.code.clone(),
            purchaser_name: ticket.purchaser_name.clone(),
            category: ticket.category.into(),
            quantity: ticket.total_count.max(0) as u32,
            session_name: ticket.session_name.clone(),
            verified_at: now_local.unix_timestamp(),
            trail,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::AttendeeCategory;
    use time::macros::{date, datetime, time};
    use uuid::Uuid;

    fn scan_ticket(payment: PaymentStatus, status: TicketStatus) -> TicketForScan {
        TicketForScan {
            ticket_id: Uuid::now_v7(),
            code: "TG-0123456789ABCDEF".into(),
            purchaser_name: "Mina Park".to_string(),
            category: AttendeeCategory::Adult,
            total_count: 2,
            payment_status: payment,
            status,
            session_id: Uuid::now_v7(),
            session_name: "Morning".to_string(),
            starts_at: time!(10:00),
            ends_at: time!(12:00),
            held_on: date!(2026 - 03 - 14),
        }
    }

    fn early_entry() -> time::Duration {
        time::Duration::minutes(DEFAULT_EARLY_ENTRY_MINUTES)
    }

    #[test]
    fn sanitize_accepts_plain_code() {
        assert_eq!(
            sanitize_code("  TG-0123456789ABCDEF \n").as_deref(),
            Some("TG-0123456789ABCDEF")
        );
    }

    #[test]
    fn sanitize_strips_url_prefix() {
        assert_eq!(
            sanitize_code("https://tickets.example.com/t/TG-0123456789ABCDEF").as_deref(),
            Some("TG-0123456789ABCDEF")
        );
        assert_eq!(
            sanitize_code("https://tickets.example.com/t/TG-0123456789ABCDEF?src=qr").as_deref(),
            Some("TG-0123456789ABCDEF")
        );
    }

    #[test]
    fn sanitize_rejects_short_input() {
        assert_eq!(sanitize_code("abc"), None);
        assert_eq!(sanitize_code("   "), None);
        assert_eq!(sanitize_code("https://tickets.example.com/"), None);
    }

    #[test]
    fn sanitize_rejects_url_without_code_segment() {
        // The hostname is not a code; a link with an empty path must be
        // denied at the sanitize gate, not looked up in the database.
        assert_eq!(sanitize_code("https://tickets.example.com"), None);
        assert_eq!(sanitize_code("https://tickets.example.com/?src=qr"), None);
        assert_eq!(sanitize_code("https://tickets.example.com///"), None);
        assert_eq!(sanitize_code("https://"), None);
    }

    #[test]
    fn happy_path_passes_every_gate() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Active);
        let now = datetime!(2026-03-14 10:30 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(eval.denial, None);
        assert_eq!(eval.trail.len(), 4);
        assert!(eval.trail.iter().all(|c| c.passed));
    }

    #[test]
    fn unpaid_ticket_denies_unpaid_even_on_wrong_day() {
        // Payment gate precedes the date gate, so the reason must be
        // UNPAID, not WRONG_DAY.
        let ticket = scan_ticket(PaymentStatus::Pending, TicketStatus::Pending);
        let wrong_day = datetime!(2026-03-15 10:30 UTC);
        let eval = evaluate_gates(&ticket, wrong_day, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::Payment, DenyReason::Unpaid))
        );
        assert_eq!(eval.trail.len(), 1);
    }

    #[test]
    fn wrong_day_denies_after_payment_passes() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Active);
        let wrong_day = datetime!(2026-03-15 10:30 UTC);
        let eval = evaluate_gates(&ticket, wrong_day, early_entry());
        assert_eq!(eval.denial, Some((GateName::Date, DenyReason::WrongDay)));
        assert!(eval.trail[0].passed);
        assert!(!eval.trail[1].passed);
    }

    #[test]
    fn early_window_boundary_admits() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Active);
        // Exactly two hours early: inclusive boundary.
        let now = datetime!(2026-03-14 08:00 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(eval.denial, None);
    }

    #[test]
    fn too_early_denies_wrong_time() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Active);
        let now = datetime!(2026-03-14 07:59 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::TimeWindow, DenyReason::WrongTime))
        );
    }

    #[test]
    fn after_session_end_denies_wrong_time() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Active);
        let now = datetime!(2026-03-14 12:01 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::TimeWindow, DenyReason::WrongTime))
        );
    }

    #[test]
    fn used_ticket_denies_already_used() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Used);
        let now = datetime!(2026-03-14 10:30 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::Usage, DenyReason::AlreadyUsed))
        );
        // Payment, date and time window all passed first.
        assert_eq!(eval.trail.len(), 4);
        assert_eq!(eval.trail.iter().filter(|c| c.passed).count(), 3);
    }

    #[test]
    fn cancelled_ticket_is_terminal_at_the_usage_gate() {
        let ticket = scan_ticket(PaymentStatus::Paid, TicketStatus::Cancelled);
        let now = datetime!(2026-03-14 10:30 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::Usage, DenyReason::AlreadyUsed))
        );
    }

    #[test]
    fn refunded_ticket_fails_the_payment_gate() {
        let ticket = scan_ticket(PaymentStatus::Refunded, TicketStatus::Cancelled);
        let now = datetime!(2026-03-14 10:30 UTC);
        let eval = evaluate_gates(&ticket, now, early_entry());
        assert_eq!(
            eval.denial,
            Some((GateName::Payment, DenyReason::Unpaid))
        );
    }
}
