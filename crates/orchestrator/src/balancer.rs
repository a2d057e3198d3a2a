//! Weighted assignment of new conversations to operators.

use database::{conversation, operator, Database, OperatorLoad};
use tracing::{debug, info};

/// Pick the operator with the smallest assigned/weight ratio.
///
/// Ratios are compared by cross-multiplication so no precision is lost.
/// Ties go to the earliest created operator, which is the first in `loads`
/// as returned by [`operator::active_operator_loads`]. Weights below 1 are
/// treated as 1.
pub fn select_operator(loads: &[OperatorLoad]) -> Option<i64> {
    let mut best: Option<&OperatorLoad> = None;

    for load in loads {
        best = match best {
            None => Some(load),
            Some(current) => {
                let lhs = i128::from(load.assigned) * i128::from(current.weight.max(1));
                let rhs = i128::from(current.assigned) * i128::from(load.weight.max(1));
                if lhs < rhs {
                    Some(load)
                } else {
                    Some(current)
                }
            }
        };
    }

    best.map(|l| l.operator_id)
}

/// Assigns newly seen conversations.
///
/// Stateless: every call derives the load from a fresh count, so operator
/// changes take effect on the next assignment.
#[derive(Debug, Clone)]
pub struct AgentBalancer {
    db: Database,
}

impl AgentBalancer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Assign an operator to an unassigned conversation.
    ///
    /// Returns the chosen operator, or `None` when no operator is active or
    /// the conversation was assigned concurrently.
    pub async fn assign(&self, conversation_id: i64) -> database::Result<Option<i64>> {
        let loads = operator::active_operator_loads(self.db.pool()).await?;

        let Some(operator_id) = select_operator(&loads) else {
            debug!(conversation_id, "No active operators, leaving conversation unassigned");
            return Ok(None);
        };

        if conversation::assign_if_unassigned(self.db.pool(), conversation_id, operator_id).await? {
            info!(conversation_id, operator_id, "Conversation assigned");
            Ok(Some(operator_id))
        } else {
            debug!(conversation_id, "Conversation already assigned");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(operator_id: i64, weight: i64, assigned: i64) -> OperatorLoad {
        OperatorLoad {
            operator_id,
            weight,
            assigned,
        }
    }

    #[test]
    fn test_empty_selects_none() {
        assert_eq!(select_operator(&[]), None);
    }

    #[test]
    fn test_tie_goes_to_first() {
        assert_eq!(select_operator(&[load(1, 1, 0), load(2, 1, 0)]), Some(1));
        assert_eq!(select_operator(&[load(1, 2, 2), load(2, 1, 1)]), Some(1));
    }

    #[test]
    fn test_lowest_ratio_wins() {
        // 2/3 < 1/1
        assert_eq!(select_operator(&[load(1, 3, 2), load(2, 1, 1)]), Some(1));
        // 3/3 > 0/1
        assert_eq!(select_operator(&[load(1, 3, 3), load(2, 1, 0)]), Some(2));
    }

    #[test]
    fn test_weighted_simulation() {
        let mut loads = vec![load(1, 3, 0), load(2, 1, 0)];
        for _ in 0..8 {
            let chosen = select_operator(&loads).unwrap();
            loads.iter_mut().find(|l| l.operator_id == chosen).unwrap().assigned += 1;
        }
        assert_eq!(loads[0].assigned, 6);
        assert_eq!(loads[1].assigned, 2);
    }

    #[test]
    fn test_zero_weight_treated_as_one() {
        assert_eq!(select_operator(&[load(1, 0, 1), load(2, 1, 2)]), Some(1));
    }

    #[tokio::test]
    async fn test_assign_skips_without_operators() {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        let (conv, _) = conversation::upsert_conversation(db.pool(), "5215550001", None)
            .await
            .unwrap();

        let balancer = AgentBalancer::new(db.clone());
        assert_eq!(balancer.assign(conv.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_assign_does_not_override() {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        operator::create_operator(db.pool(), "a", "A", "pw", 1).await.unwrap();
        let b = operator::create_operator(db.pool(), "b", "B", "pw", 1).await.unwrap();
        let (conv, _) = conversation::upsert_conversation(db.pool(), "5215550002", None)
            .await
            .unwrap();
        conversation::assign_operator(db.pool(), conv.id, Some(b.id)).await.unwrap();

        let balancer = AgentBalancer::new(db.clone());
        assert_eq!(balancer.assign(conv.id).await.unwrap(), None);

        let stored = conversation::get_conversation(db.pool(), conv.id).await.unwrap();
        assert_eq!(stored.assigned_operator_id, Some(b.id));
    }
}
