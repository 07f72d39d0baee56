use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use super::{
    SqliteSnapshot, datetime_col, format_datetime, insert_result, opt_uuid_col, parse_col,
    uuid_col,
};
use crate::error::{Error, Result};
use crate::store::IdentityStore;
use crate::types::*;

const USER_COLUMNS: &str = "id, username, normalized_email, password_hash, auth_type, verified,
     autogenerated, application_id, first_name, last_name, created_at, updated_at";

const TOKEN_COLUMNS: &str =
    "id, user_id, active, token_type, restricted, note, created_at, updated_at";

const GROUP_COLUMNS: &str = "id, name, autogenerated, parent, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_col(row, 0)?,
        username: row.get(1)?,
        normalized_email: row.get(2)?,
        password_hash: row.get(3)?,
        auth_type: row.get(4)?,
        verified: row.get(5)?,
        autogenerated: row.get(6)?,
        application_id: opt_uuid_col(row, 7)?,
        first_name: row.get(8)?,
        last_name: row.get(9)?,
        created_at: datetime_col(row, 10)?,
        updated_at: datetime_col(row, 11)?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        active: row.get(2)?,
        token_type: parse_col(row, 3)?,
        restricted: row.get(4)?,
        note: row.get(5)?,
        created_at: datetime_col(row, 6)?,
        updated_at: datetime_col(row, 7)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: uuid_col(row, 0)?,
        name: row.get(1)?,
        autogenerated: row.get(2)?,
        parent: opt_uuid_col(row, 3)?,
        created_at: datetime_col(row, 4)?,
        updated_at: datetime_col(row, 5)?,
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<GroupMembership> {
    Ok(GroupMembership {
        group_id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        user_type: parse_col(row, 2)?,
    })
}

impl SqliteSnapshot<'_> {
    fn query_user(&self, filter: &str, params: impl rusqlite::Params) -> Result<Option<User>> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}"),
                params,
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }
}

impl IdentityStore for SqliteSnapshot<'_> {
    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO users (id, username, normalized_email, password_hash, auth_type, verified,
                                autogenerated, application_id, first_name, last_name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                user.id.to_string(),
                user.username,
                user.normalized_email,
                user.password_hash,
                user.auth_type,
                user.verified,
                user.autogenerated,
                user.application_id.map(|id| id.to_string()),
                user.first_name,
                user.last_name,
                format_datetime(&user.created_at),
                format_datetime(&user.updated_at),
            ],
        ))
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.query_user("id = ?1", params![id.to_string()])
    }

    fn get_user_by_username(
        &self,
        username: &str,
        application_id: Option<Uuid>,
    ) -> Result<Option<User>> {
        self.query_user(
            "username = ?1 AND IFNULL(application_id, '') = IFNULL(?2, '')",
            params![username, application_id.map(|id| id.to_string())],
        )
    }

    fn get_user_by_email(
        &self,
        normalized_email: &str,
        application_id: Option<Uuid>,
    ) -> Result<Option<User>> {
        self.query_user(
            "normalized_email = ?1 AND IFNULL(application_id, '') = IFNULL(?2, '')",
            params![normalized_email, application_id.map(|id| id.to_string())],
        )
    }

    fn set_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, format_datetime(&Utc::now()), user_id.to_string()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO tokens (id, user_id, active, token_type, restricted, note, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                token.id.to_string(),
                token.user_id.to_string(),
                token.active,
                token.token_type.as_str(),
                token.restricted,
                token.note,
                format_datetime(&token.created_at),
                format_datetime(&token.updated_at),
            ],
        ))
    }

    fn get_token(&self, id: Uuid) -> Result<Option<Token>> {
        self.conn
            .query_row(
                &format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = ?1"),
                params![id.to_string()],
                token_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_user_tokens(&self, user_id: Uuid) -> Result<Vec<Token>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE user_id = ?1 ORDER BY created_at DESC"
        ))?;

        let rows = stmt.query_map(params![user_id.to_string()], token_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn deactivate_token(&self, id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE tokens SET active = 0, updated_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id.to_string()],
        )?;
        Ok(rows > 0)
    }

    // Group operations

    fn update_token(&self, id: Uuid, token_type: TokenType, note: Option<&str>) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE tokens SET token_type = ?1, note = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                token_type.as_str(),
                note,
                format_datetime(&Utc::now()),
                id.to_string()
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn create_group(&self, group: &Group) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO user_groups (id, name, autogenerated, parent, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                group.id.to_string(),
                group.name,
                group.autogenerated,
                group.parent.map(|id| id.to_string()),
                format_datetime(&group.created_at),
                format_datetime(&group.updated_at),
            ],
        ))
    }

    fn get_group(&self, id: Uuid) -> Result<Option<Group>> {
        self.conn
            .query_row(
                &format!("SELECT {GROUP_COLUMNS} FROM user_groups WHERE id = ?1"),
                params![id.to_string()],
                group_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_child_groups(&self, parent: Uuid) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM user_groups WHERE parent = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![parent.to_string()], group_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_group_parent(&self, id: Uuid, parent: Option<Uuid>) -> Result<()> {
        let result = self.conn.execute(
            "UPDATE user_groups SET parent = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                parent.map(|p| p.to_string()),
                format_datetime(&Utc::now()),
                id.to_string()
            ],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            other => insert_result(other),
        }
    }

    fn rename_group(&self, id: Uuid, name: &str) -> Result<()> {
        let result = self.conn.execute(
            "UPDATE user_groups SET name = ?1, updated_at = ?2 WHERE id = ?3",
            params![name, format_datetime(&Utc::now()), id.to_string()],
        );

        match result {
            Ok(0) => Err(Error::NotFound),
            other => insert_result(other),
        }
    }

    fn delete_group(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_groups WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    // Membership operations

    fn upsert_membership(&self, membership: &GroupMembership) -> Result<()> {
        self.conn.execute(
            "INSERT INTO group_users (group_id, user_id, user_type)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (group_id, user_id) DO UPDATE SET user_type = excluded.user_type",
            params![
                membership.group_id.to_string(),
                membership.user_id.to_string(),
                membership.user_type.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMembership>> {
        self.conn
            .query_row(
                "SELECT group_id, user_id, user_type FROM group_users
                 WHERE group_id = ?1 AND user_id = ?2",
                params![group_id.to_string(), user_id.to_string()],
                membership_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_membership(&self, group_id: Uuid, user_id: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM group_users WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.to_string(), user_id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn list_user_memberships(&self, user_id: Uuid) -> Result<Vec<GroupMembership>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, user_id, user_type FROM group_users WHERE user_id = ?1",
        )?;

        let rows = stmt.query_map(params![user_id.to_string()], membership_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_group_members(&self, group_id: Uuid) -> Result<Vec<GroupMembership>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_id, user_id, user_type FROM group_users WHERE group_id = ?1",
        )?;

        let rows = stmt.query_map(params![group_id.to_string()], membership_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_owned_groups(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM group_users WHERE user_id = ?1 AND user_type = 'owner'",
            params![user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_human_members(&self, group_id: Uuid) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT u.id)
             FROM users u
             JOIN group_users gu ON gu.user_id = u.id
             WHERE gu.group_id = ?1 AND u.autogenerated = 0",
            params![group_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
