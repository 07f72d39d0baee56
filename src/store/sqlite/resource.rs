use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::{SqliteSnapshot, datetime_col, format_datetime, insert_result, opt_uuid_col, uuid_col};
use crate::error::{Error, Result};
use crate::store::ResourceStore;
use crate::types::*;

const APPLICATION_COLUMNS: &str = "id, group_id, name, description, created_at";

const RESOURCE_COLUMNS: &str = "id, application_id, resource_data, created_at, updated_at";

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: uuid_col(row, 0)?,
        group_id: uuid_col(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: datetime_col(row, 4)?,
    })
}

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    let raw: String = row.get(2)?;
    let resource_data = serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Resource {
        id: uuid_col(row, 0)?,
        application_id: uuid_col(row, 1)?,
        resource_data,
        created_at: datetime_col(row, 3)?,
        updated_at: datetime_col(row, 4)?,
    })
}

fn permission_from_row(row: &Row<'_>) -> rusqlite::Result<ResourcePermission> {
    Ok(ResourcePermission {
        id: uuid_col(row, 0)?,
        resource_id: uuid_col(row, 1)?,
        permission: row.get(2)?,
    })
}

/// Rebuilds a holder from its two nullable columns.
fn holder_from_columns(row: &Row<'_>, user_idx: usize, group_idx: usize) -> rusqlite::Result<Holder> {
    match (opt_uuid_col(row, user_idx)?, opt_uuid_col(row, group_idx)?) {
        (Some(user_id), None) => Ok(Holder::User(user_id)),
        (None, Some(group_id)) => Ok(Holder::Group(group_id)),
        _ => Err(rusqlite::Error::FromSqlConversionFailure(
            user_idx,
            Type::Text,
            "grant must have exactly one holder".into(),
        )),
    }
}

fn encode_json(data: &serde_json::Value) -> Result<String> {
    serde_json::to_string(data).map_err(|e| Error::BadRequest(format!("invalid resource data: {e}")))
}

impl ResourceStore for SqliteSnapshot<'_> {
    // Application operations

    fn create_application(&self, app: &Application) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO applications (id, group_id, name, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                app.id.to_string(),
                app.group_id.to_string(),
                app.name,
                app.description,
                format_datetime(&app.created_at),
            ],
        ))
    }

    fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        self.conn
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.to_string()],
                application_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_group_applications(&self, group_id: Uuid) -> Result<Vec<Application>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE group_id = ?1 ORDER BY name"
        ))?;

        let rows = stmt.query_map(params![group_id.to_string()], application_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_application(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM applications WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    // Resource operations

    fn create_resource(&self, resource: &Resource) -> Result<()> {
        insert_result(self.conn.execute(
            "INSERT INTO resources (id, application_id, resource_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                resource.id.to_string(),
                resource.application_id.to_string(),
                encode_json(&resource.resource_data)?,
                format_datetime(&resource.created_at),
                format_datetime(&resource.updated_at),
            ],
        ))
    }

    fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
        self.conn
            .query_row(
                &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
                params![id.to_string()],
                resource_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn update_resource_data(&self, id: Uuid, data: &serde_json::Value) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE resources SET resource_data = ?1, updated_at = ?2 WHERE id = ?3",
            params![encode_json(data)?, format_datetime(&Utc::now()), id.to_string()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_resource(&self, id: Uuid) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM resources WHERE id = ?1", params![id.to_string()])?;
        Ok(rows > 0)
    }

    fn list_application_resources(&self, application_id: Uuid) -> Result<Vec<Resource>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources
             WHERE application_id = ?1 ORDER BY created_at, id"
        ))?;

        let rows = stmt.query_map(params![application_id.to_string()], resource_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_granted_resources(
        &self,
        user_id: Uuid,
        group_ids: &[Uuid],
        application_id: Option<Uuid>,
    ) -> Result<Vec<Resource>> {
        // ?1 = user, ?2 = application or NULL, ?3.. = groups
        let group_placeholders = (0..group_ids.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let group_filter = if group_ids.is_empty() {
            String::new()
        } else {
            format!(" OR rhp.group_id IN ({group_placeholders})")
        };

        let sql = format!(
            "SELECT {RESOURCE_COLUMNS} FROM resources
             WHERE (?2 IS NULL OR application_id = ?2)
               AND id IN (
                 SELECT rhp.resource_id FROM resource_holder_permissions rhp
                 WHERE rhp.user_id = ?1{group_filter}
               )
             ORDER BY created_at, id"
        );

        let mut values = vec![
            Some(user_id.to_string()),
            application_id.map(|id| id.to_string()),
        ];
        values.extend(group_ids.iter().map(|id| Some(id.to_string())));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), resource_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Permission definitions

    fn ensure_permission(&self, resource_id: Uuid, name: &str) -> Result<ResourcePermission> {
        self.conn.execute(
            "INSERT INTO resource_permissions (id, resource_id, permission)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (resource_id, permission) DO NOTHING",
            params![Uuid::new_v4().to_string(), resource_id.to_string(), name],
        )?;

        self.get_permission_by_name(resource_id, name)?
            .ok_or(Error::NotFound)
    }

    fn get_permission_by_name(
        &self,
        resource_id: Uuid,
        name: &str,
    ) -> Result<Option<ResourcePermission>> {
        self.conn
            .query_row(
                "SELECT id, resource_id, permission FROM resource_permissions
                 WHERE resource_id = ?1 AND permission = ?2",
                params![resource_id.to_string(), name],
                permission_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_resource_permissions(&self, resource_id: Uuid) -> Result<Vec<ResourcePermission>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, resource_id, permission FROM resource_permissions
             WHERE resource_id = ?1 ORDER BY permission",
        )?;

        let rows = stmt.query_map(params![resource_id.to_string()], permission_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Holder grants

    fn insert_holder_permission(&self, grant: &ResourceHolderPermission) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT INTO resource_holder_permissions (id, user_id, group_id, resource_id, permission_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT DO NOTHING",
            params![
                grant.id.to_string(),
                grant.holder.user_id().map(|id| id.to_string()),
                grant.holder.group_id().map(|id| id.to_string()),
                grant.resource_id.to_string(),
                grant.permission_id.to_string(),
                format_datetime(&grant.created_at),
            ],
        )?;
        Ok(rows > 0)
    }

    fn delete_holder_permission(
        &self,
        holder: Holder,
        resource_id: Uuid,
        permission_id: Uuid,
    ) -> Result<bool> {
        let column = match holder {
            Holder::User(_) => "user_id",
            Holder::Group(_) => "group_id",
        };
        let rows = self.conn.execute(
            &format!(
                "DELETE FROM resource_holder_permissions
                 WHERE {column} = ?1 AND resource_id = ?2 AND permission_id = ?3"
            ),
            params![
                holder.id().to_string(),
                resource_id.to_string(),
                permission_id.to_string()
            ],
        )?;
        Ok(rows > 0)
    }

    fn list_granted_permission_names(
        &self,
        resource_id: Uuid,
        user_id: Uuid,
        group_ids: &[Uuid],
    ) -> Result<Vec<String>> {
        // ?1 = resource, ?2 = user, ?3.. = groups
        let group_placeholders = (0..group_ids.len())
            .map(|i| format!("?{}", i + 3))
            .collect::<Vec<_>>()
            .join(", ");
        let group_filter = if group_ids.is_empty() {
            String::new()
        } else {
            format!(" OR rhp.group_id IN ({group_placeholders})")
        };

        let sql = format!(
            "SELECT DISTINCT rp.permission
             FROM resource_holder_permissions rhp
             JOIN resource_permissions rp ON rp.id = rhp.permission_id
             WHERE rhp.resource_id = ?1 AND (rhp.user_id = ?2{group_filter})
             ORDER BY rp.permission"
        );

        let mut values = vec![resource_id.to_string(), user_id.to_string()];
        values.extend(group_ids.iter().map(Uuid::to_string));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_resource_grants(&self, resource_id: Uuid) -> Result<Vec<(Holder, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT rhp.user_id, rhp.group_id, rp.permission
             FROM resource_holder_permissions rhp
             JOIN resource_permissions rp ON rp.id = rhp.permission_id
             WHERE rhp.resource_id = ?1
             ORDER BY rhp.user_id, rhp.group_id, rp.permission",
        )?;

        let rows = stmt.query_map(params![resource_id.to_string()], |row| {
            Ok((holder_from_columns(row, 0, 1)?, row.get::<_, String>(2)?))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
