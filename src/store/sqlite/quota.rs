use rusqlite::{OptionalExtension, params};
use uuid::Uuid;

use super::{SqliteSnapshot, insert_result, uuid_col};
use crate::error::{Error, Result};
use crate::store::QuotaStore;
use crate::types::*;

impl QuotaStore for SqliteSnapshot<'_> {
    fn create_subscription_plan(&self, plan: &SubscriptionPlan) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO subscription_plans (id, name, description, default_units, plan_type, public)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                plan.id.to_string(),
                plan.name,
                plan.description,
                plan.default_units,
                plan.plan_type,
                plan.public,
            ],
        ))
    }

    fn get_subscription_plan(&self, id: Uuid) -> Result<Option<SubscriptionPlan>> {
        self.conn
            .query_row(
                "SELECT id, name, description, default_units, plan_type, public
                 FROM subscription_plans WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok(SubscriptionPlan {
                        id: uuid_col(row, 0)?,
                        name: row.get(1)?,
                        description: row.get(2)?,
                        default_units: row.get(3)?,
                        plan_type: row.get(4)?,
                        public: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.conn.execute(
            "INSERT INTO subscriptions (group_id, subscription_plan_id, active, units)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (group_id, subscription_plan_id) DO UPDATE SET
                active = excluded.active,
                units = excluded.units",
            params![
                subscription.group_id.to_string(),
                subscription.subscription_plan_id.to_string(),
                subscription.active,
                subscription.units,
            ],
        )?;
        Ok(())
    }

    fn list_group_subscriptions(&self, group_id: Uuid) -> Result<Vec<Subscription>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, subscription_plan_id, active, units
             FROM subscriptions WHERE group_id = ?1",
        )?;

        let rows = stmt.query_map(params![group_id.to_string()], |row| {
            Ok(Subscription {
                group_id: uuid_col(row, 0)?,
                subscription_plan_id: uuid_col(row, 1)?,
                active: row.get(2)?,
                units: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn active_units(&self, group_id: Uuid, plan_type: &str) -> Result<Option<i64>> {
        let units: Option<i64> = self.conn.query_row(
            "SELECT SUM(s.units)
             FROM subscriptions s
             JOIN subscription_plans p ON p.id = s.subscription_plan_id
             WHERE s.group_id = ?1 AND s.active = 1 AND p.plan_type = ?2",
            params![group_id.to_string(), plan_type],
            |row| row.get(0),
        )?;
        Ok(units)
    }

    fn get_user_group_limit(&self, user_id: Uuid) -> Result<Option<UserGroupLimit>> {
        self.conn
            .query_row(
                "SELECT id, user_id, group_limit FROM user_group_limits WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok(UserGroupLimit {
                        id: uuid_col(row, 0)?,
                        user_id: uuid_col(row, 1)?,
                        group_limit: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn set_user_group_limit(&self, user_id: Uuid, group_limit: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO user_group_limits (id, user_id, group_limit)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (user_id) DO UPDATE SET group_limit = excluded.group_limit",
            params![Uuid::new_v4().to_string(), user_id.to_string(), group_limit],
        )?;
        Ok(())
    }
}
