//! Per-session inventory ledger.
//!
//! One `session_inventory` row per session is the single point of
//! contention for concurrent purchases. All mutations are either a single
//! conditional `UPDATE` (reserve, release) whose row lock serializes
//! concurrent callers, or a `SELECT ... FOR UPDATE` transaction
//! (recompute) that takes the same lock. The counter arithmetic itself is
//! factored into [`LedgerCounters`] so the guard and sold-out derivation
//! are unit testable without a database.

use crate::entities::AttendeeCategory;
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use thiserror::Error;
use uuid::Uuid;

/// Capacity failure kinds surfaced by `reserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("insufficient capacity for the requested category/quantity")]
    InsufficientCapacity,
    #[error("session is inactive or sold out")]
    SessionInactive,
    #[error("session has no inventory ledger")]
    SessionNotFound,
}

/// Booked/capacity counts per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryCounts {
    pub adult: i32,
    pub student: i32,
    pub child: i32,
}

impl CategoryCounts {
    pub fn get(&self, category: AttendeeCategory) -> i32 {
        match category {
            AttendeeCategory::Adult => self.adult,
            AttendeeCategory::Student => self.student,
            AttendeeCategory::Child => self.child,
        }
    }

    pub fn get_mut(&mut self, category: AttendeeCategory) -> &mut i32 {
        match category {
            AttendeeCategory::Adult => &mut self.adult,
            AttendeeCategory::Student => &mut self.student,
            AttendeeCategory::Child => &mut self.child,
        }
    }

    pub fn total(&self) -> i32 {
        self.adult + self.student + self.child
    }
}

/// Pure ledger state: capacity and booked counts for one session.
///
/// Invariant: `0 <= booked[c]` and `booked[c] + available(c) == capacity[c]`
/// for every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerCounters {
    pub capacity: CategoryCounts,
    pub booked: CategoryCounts,
}

impl LedgerCounters {
    pub fn new(capacity: CategoryCounts) -> Self {
        Self {
            capacity,
            booked: CategoryCounts::default(),
        }
    }

    pub fn available(&self, category: AttendeeCategory) -> i32 {
        self.capacity.get(category) - self.booked.get(category)
    }

    pub fn total_available(&self) -> i32 {
        self.capacity.total() - self.booked.total()
    }

    /// Whether the session should be flagged sold out: some category with
    /// nonzero capacity is exhausted, or nothing is left overall.
    /// Categories configured with zero capacity never trip the flag on
    /// their own.
    pub fn is_sold_out(&self) -> bool {
        if self.total_available() <= 0 {
            return true;
        }
        AttendeeCategory::ALL
            .iter()
            .any(|&c| self.capacity.get(c) > 0 && self.available(c) <= 0)
    }

    /// Apply a reservation if both the per-category and the total
    /// available counts cover `qty`; otherwise fail without side effect.
    pub fn reserve(&mut self, category: AttendeeCategory, qty: i32) -> Result<(), CapacityError> {
        if self.available(category) < qty || self.total_available() < qty {
            return Err(CapacityError::InsufficientCapacity);
        }
        *self.booked.get_mut(category) += qty;
        Ok(())
    }

    /// Compensating action: return `qty` units of `category`, floored at
    /// zero booked.
    pub fn release(&mut self, category: AttendeeCategory, qty: i32) {
        let booked = self.booked.get_mut(category);
        *booked = (*booked - qty).max(0);
    }

    /// Rebuild counters from per-category sold sums (recompute path).
    pub fn from_sold(capacity: CategoryCounts, sold: CategoryCounts) -> Self {
        Self {
            capacity,
            booked: sold,
        }
    }
}

/// The `session_inventory` row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InventoryLedger {
    pub session_id: Uuid,
    pub adult_capacity: i32,
    pub student_capacity: i32,
    pub child_capacity: i32,
    pub adult_booked: i32,
    pub student_booked: i32,
    pub child_booked: i32,
    pub is_sold_out: bool,
    pub is_active: bool,
    pub updated_at: time::PrimitiveDateTime,
}

impl InventoryLedger {
    pub fn counters(&self) -> LedgerCounters {
        LedgerCounters {
            capacity: CategoryCounts {
                adult: self.adult_capacity,
                student: self.student_capacity,
                child: self.child_capacity,
            },
            booked: CategoryCounts {
                adult: self.adult_booked,
                student: self.student_booked,
                child: self.child_booked,
            },
        }
    }
}

/// Result of a successful reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reserved {
    /// The reservation drove a category or the total to zero; the caller
    /// must propagate deactivation to the session row.
    pub sold_out: bool,
}

// The reserve guard and the sold-out derivation live in one conditional
// UPDATE so concurrent reservations serialize on the row lock and can
// never jointly oversell. SET expressions see the pre-update column
// values, hence the repeated CASE deltas.
const RESERVE_SQL: &str = r#"
UPDATE session_inventory SET
    adult_booked   = adult_booked   + CASE WHEN $2 = 'adult'::attendee_category   THEN $3 ELSE 0 END,
    student_booked = student_booked + CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END,
    child_booked   = child_booked   + CASE WHEN $2 = 'child'::attendee_category   THEN $3 ELSE 0 END,
    is_sold_out =
        (adult_capacity + student_capacity + child_capacity)
            - (adult_booked + student_booked + child_booked) - $3 <= 0
        OR (adult_capacity > 0 AND adult_booked
            + CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END >= adult_capacity)
        OR (student_capacity > 0 AND student_booked
            + CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END >= student_capacity)
        OR (child_capacity > 0 AND child_booked
            + CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END >= child_capacity),
    is_active = NOT (
        (adult_capacity + student_capacity + child_capacity)
            - (adult_booked + student_booked + child_booked) - $3 <= 0
        OR (adult_capacity > 0 AND adult_booked
            + CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END >= adult_capacity)
        OR (student_capacity > 0 AND student_booked
            + CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END >= student_capacity)
        OR (child_capacity > 0 AND child_booked
            + CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END >= child_capacity)
    ),
    updated_at = NOW()
WHERE session_id = $1
    AND is_active
    AND CASE $2
            WHEN 'adult'::attendee_category   THEN adult_capacity - adult_booked
            WHEN 'student'::attendee_category THEN student_capacity - student_booked
            ELSE child_capacity - child_booked
        END >= $3
    AND (adult_capacity + student_capacity + child_capacity)
        - (adult_booked + student_booked + child_booked) >= $3
RETURNING is_sold_out
"#;

// Release re-derives the flags from the decremented counts instead of
// force-clearing them: returning a student seat must not reopen a session
// whose adult capacity is still exhausted.
const RELEASE_SQL: &str = r#"
UPDATE session_inventory SET
    adult_booked   = GREATEST(adult_booked
        - CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END, 0),
    student_booked = GREATEST(student_booked
        - CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END, 0),
    child_booked   = GREATEST(child_booked
        - CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END, 0),
    is_sold_out =
        (adult_capacity + student_capacity + child_capacity)
            - (GREATEST(adult_booked
                - CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END, 0)
               + GREATEST(student_booked
                - CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END, 0)
               + GREATEST(child_booked
                - CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END, 0)) <= 0
        OR (adult_capacity > 0 AND GREATEST(adult_booked
            - CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END, 0) >= adult_capacity)
        OR (student_capacity > 0 AND GREATEST(student_booked
            - CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END, 0) >= student_capacity)
        OR (child_capacity > 0 AND GREATEST(child_booked
            - CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END, 0) >= child_capacity),
    is_active = NOT (
        (adult_capacity + student_capacity + child_capacity)
            - (GREATEST(adult_booked
                - CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END, 0)
               + GREATEST(student_booked
                - CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END, 0)
               + GREATEST(child_booked
                - CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END, 0)) <= 0
        OR (adult_capacity > 0 AND GREATEST(adult_booked
            - CASE WHEN $2 = 'adult'::attendee_category THEN $3 ELSE 0 END, 0) >= adult_capacity)
        OR (student_capacity > 0 AND GREATEST(student_booked
            - CASE WHEN $2 = 'student'::attendee_category THEN $3 ELSE 0 END, 0) >= student_capacity)
        OR (child_capacity > 0 AND GREATEST(child_booked
            - CASE WHEN $2 = 'child'::attendee_category THEN $3 ELSE 0 END, 0) >= child_capacity)
    ),
    updated_at = NOW()
WHERE session_id = $1
RETURNING is_sold_out
"#;

impl InventoryLedger {
    /// Atomically reserve `qty` units of `category` inside an open
    /// transaction. Fails without side effect when the session is
    /// inactive, missing, or lacks capacity (per category or in total).
    pub async fn reserve_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
        category: AttendeeCategory,
        qty: i32,
    ) -> Result<Result<Reserved, CapacityError>, sqlx::Error> {
        let sold_out = sqlx::query_scalar::<_, bool>(RESERVE_SQL)
            .bind(session_id)
            .bind(category)
            .bind(qty)
            .fetch_optional(&mut **tx)
            .await?;

        match sold_out {
            Some(sold_out) => Ok(Ok(Reserved { sold_out })),
            None => Ok(Err(Self::diagnose_reserve_failure(tx, session_id).await?)),
        }
    }

    /// Classify a failed reservation after the conditional UPDATE matched
    /// no row.
    async fn diagnose_reserve_failure(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
    ) -> Result<CapacityError, sqlx::Error> {
        let is_active = sqlx::query_scalar::<_, bool>(
            "SELECT is_active FROM session_inventory WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(match is_active {
            None => CapacityError::SessionNotFound,
            Some(false) => CapacityError::SessionInactive,
            Some(true) => CapacityError::InsufficientCapacity,
        })
    }

    /// Compensating action for a failed payment: return `qty` units of
    /// `category` and re-derive the sold-out/active flags from the
    /// decremented counts. The session row follows the recomputed flag.
    pub async fn release_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
        category: AttendeeCategory,
        qty: i32,
    ) -> Result<(), sqlx::Error> {
        let sold_out = sqlx::query_scalar::<_, bool>(RELEASE_SQL)
            .bind(session_id)
            .bind(category)
            .bind(qty)
            .fetch_optional(&mut **tx)
            .await?;
        if let Some(sold_out) = sold_out {
            Self::set_session_active_tx(tx, session_id, !sold_out).await?;
        }
        Ok(())
    }

    /// Keep the session's own active flag in step with the ledger after a
    /// reserve sells the session out or a release reopens it.
    pub async fn set_session_active_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session_id: Uuid,
        active: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sessions SET is_active = $2 WHERE id = $1")
            .bind(session_id)
            .bind(active)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Snapshot of one session's ledger, for the admin surface.
#[derive(Debug, Clone)]
pub struct GetLedgerSnapshot {
    pub session_id: Uuid,
}

impl Processor<GetLedgerSnapshot> for DatabaseProcessor {
    type Output = Option<InventoryLedger>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLedgerSnapshot")]
    async fn process(&self, query: GetLedgerSnapshot) -> Result<Option<InventoryLedger>, sqlx::Error> {
        sqlx::query_as::<_, InventoryLedger>(
            r#"
            SELECT session_id, adult_capacity, student_capacity, child_capacity,
                   adult_booked, student_booked, child_booked,
                   is_sold_out, is_active, updated_at
            FROM session_inventory
            WHERE session_id = $1
            "#,
        )
        .bind(query.session_id)
        .fetch_optional(&self.pool)
        .await
    }
}

/// Authoritative reconciliation: rebuild one session's counters from the
/// ticket table.
///
/// Idempotent. Serializes against in-flight reservations by locking the
/// ledger row (`FOR UPDATE`) before reading the ticket sums, so it can
/// never overwrite the effect of a committed reservation. Cancelled and
/// failed tickets are excluded: failed tickets were already compensated
/// at rejection time.
#[derive(Debug, Clone)]
pub struct RecomputeLedger {
    pub session_id: Uuid,
}

impl Processor<RecomputeLedger> for DatabaseProcessor {
    type Output = Option<InventoryLedger>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RecomputeLedger")]
    async fn process(&self, cmd: RecomputeLedger) -> Result<Option<InventoryLedger>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let Some(ledger) = sqlx::query_as::<_, InventoryLedger>(
            r#"
            SELECT session_id, adult_capacity, student_capacity, child_capacity,
                   adult_booked, student_booked, child_booked,
                   is_sold_out, is_active, updated_at
            FROM session_inventory
            WHERE session_id = $1
            FOR UPDATE
            "#,
        )
        .bind(cmd.session_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let sold = sqlx::query_as::<_, SoldSums>(
            r#"
            SELECT
                COALESCE(SUM(adult_count), 0)::INT AS adult,
                COALESCE(SUM(student_count), 0)::INT AS student,
                COALESCE(SUM(child_count), 0)::INT AS child
            FROM tickets
            WHERE session_id = $1 AND status NOT IN ('cancelled', 'failed')
            "#,
        )
        .bind(cmd.session_id)
        .fetch_one(&mut *tx)
        .await?;

        let counters = LedgerCounters::from_sold(
            ledger.counters().capacity,
            CategoryCounts {
                adult: sold.adult,
                student: sold.student,
                child: sold.child,
            },
        );
        let sold_out = counters.is_sold_out();

        let updated = sqlx::query_as::<_, InventoryLedger>(
            r#"
            UPDATE session_inventory SET
                adult_booked = $2, student_booked = $3, child_booked = $4,
                is_sold_out = $5, is_active = $6, updated_at = NOW()
            WHERE session_id = $1
            RETURNING session_id, adult_capacity, student_capacity, child_capacity,
                      adult_booked, student_booked, child_booked,
                      is_sold_out, is_active, updated_at
            "#,
        )
        .bind(cmd.session_id)
        .bind(counters.booked.adult)
        .bind(counters.booked.student)
        .bind(counters.booked.child)
        .bind(sold_out)
        .bind(!sold_out)
        .fetch_one(&mut *tx)
        .await?;

        InventoryLedger::set_session_active_tx(&mut tx, cmd.session_id, !sold_out).await?;

        tx.commit().await?;
        Ok(Some(updated))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct SoldSums {
    adult: i32,
    student: i32,
    child: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn counters(adult: i32, student: i32, child: i32) -> LedgerCounters {
        LedgerCounters::new(CategoryCounts {
            adult,
            student,
            child,
        })
    }

    #[test]
    fn reserve_decrements_available_and_keeps_invariant() {
        let mut ledger = counters(10, 5, 3);
        ledger.reserve(AttendeeCategory::Adult, 4).unwrap();
        assert_eq!(ledger.available(AttendeeCategory::Adult), 6);
        assert_eq!(ledger.booked.adult + ledger.available(AttendeeCategory::Adult), 10);
        assert_eq!(ledger.total_available(), 14);
        assert!(!ledger.is_sold_out());
    }

    #[test]
    fn reserve_fails_without_side_effect_when_category_exhausted() {
        let mut ledger = counters(2, 5, 3);
        ledger.reserve(AttendeeCategory::Adult, 2).unwrap();
        let before = ledger;
        assert_eq!(
            ledger.reserve(AttendeeCategory::Adult, 1),
            Err(CapacityError::InsufficientCapacity)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn reserve_guards_total_as_well_as_category() {
        // Category has room on paper but the total does not, which can
        // only happen if capacity data drifted; the guard still holds.
        let mut ledger = LedgerCounters {
            capacity: CategoryCounts {
                adult: 5,
                student: 0,
                child: 0,
            },
            booked: CategoryCounts {
                adult: 3,
                student: 0,
                child: 0,
            },
        };
        assert!(ledger.reserve(AttendeeCategory::Adult, 2).is_ok());
        assert_eq!(
            ledger.reserve(AttendeeCategory::Adult, 1),
            Err(CapacityError::InsufficientCapacity)
        );
    }

    #[test]
    fn single_adult_session_sells_out_after_one_purchase() {
        // Example scenario: capacity {adult: 1}, two buyers race; the
        // loser sees InsufficientCapacity and the ledger ends sold out.
        let mut ledger = counters(1, 0, 0);
        ledger.reserve(AttendeeCategory::Adult, 1).unwrap();
        assert_eq!(
            ledger.reserve(AttendeeCategory::Adult, 1),
            Err(CapacityError::InsufficientCapacity)
        );
        assert_eq!(ledger.booked.adult, 1);
        assert_eq!(ledger.available(AttendeeCategory::Adult), 0);
        assert!(ledger.is_sold_out());
    }

    #[test]
    fn exhausting_one_nonzero_category_flags_sold_out() {
        let mut ledger = counters(1, 5, 0);
        ledger.reserve(AttendeeCategory::Adult, 1).unwrap();
        assert!(ledger.is_sold_out());
    }

    #[test]
    fn zero_capacity_category_does_not_flag_sold_out() {
        let mut ledger = counters(10, 0, 0);
        ledger.reserve(AttendeeCategory::Adult, 1).unwrap();
        assert!(!ledger.is_sold_out());
    }

    #[test]
    fn release_restores_availability_and_floors_at_zero() {
        let mut ledger = counters(3, 0, 0);
        ledger.reserve(AttendeeCategory::Adult, 2).unwrap();
        ledger.release(AttendeeCategory::Adult, 2);
        assert_eq!(ledger.available(AttendeeCategory::Adult), 3);
        ledger.release(AttendeeCategory::Adult, 5);
        assert_eq!(ledger.booked.adult, 0);
    }

    #[test]
    fn release_keeps_sold_out_while_another_category_is_exhausted() {
        // Returning a student seat must not reopen a session whose adult
        // capacity is still fully booked.
        let mut ledger = counters(1, 1, 0);
        ledger.reserve(AttendeeCategory::Adult, 1).unwrap();
        ledger.reserve(AttendeeCategory::Student, 1).unwrap();
        assert!(ledger.is_sold_out());
        ledger.release(AttendeeCategory::Student, 1);
        assert!(ledger.is_sold_out());
        assert_eq!(ledger.available(AttendeeCategory::Student), 1);
    }

    #[test]
    fn recompute_from_sold_is_idempotent() {
        let capacity = CategoryCounts {
            adult: 10,
            student: 4,
            child: 2,
        };
        let sold = CategoryCounts {
            adult: 7,
            student: 4,
            child: 0,
        };
        let first = LedgerCounters::from_sold(capacity, sold);
        let second = LedgerCounters::from_sold(capacity, sold);
        assert_eq!(first, second);
        assert!(first.is_sold_out());
        assert_eq!(first.available(AttendeeCategory::Adult), 3);
    }
}
