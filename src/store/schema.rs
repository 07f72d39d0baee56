pub const SCHEMA: &str = r#"
-- Users; username and email are unique per application scope (NULL = top level)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    normalized_email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    auth_type TEXT NOT NULL DEFAULT 'password',
    verified INTEGER NOT NULL DEFAULT 0,
    autogenerated INTEGER NOT NULL DEFAULT 0,
    application_id TEXT REFERENCES applications(id) ON DELETE CASCADE,
    first_name TEXT,
    last_name TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Bearer tokens; revoked tokens are deactivated, never deleted
CREATE TABLE IF NOT EXISTS tokens (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    active INTEGER NOT NULL DEFAULT 1,
    token_type TEXT NOT NULL DEFAULT 'bugout',
    restricted INTEGER NOT NULL DEFAULT 0,
    note TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Groups form a forest; deleting a group orphans its children
CREATE TABLE IF NOT EXISTS user_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    autogenerated INTEGER NOT NULL DEFAULT 0,
    parent TEXT REFERENCES user_groups(id) ON DELETE SET NULL,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS group_users (
    group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    user_type TEXT NOT NULL CHECK (user_type IN ('owner', 'admin', 'member')),
    PRIMARY KEY (group_id, user_id)
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    resource_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS resource_permissions (
    id TEXT PRIMARY KEY,
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    permission TEXT NOT NULL,
    UNIQUE(resource_id, permission)
);

-- Grants: exactly one of user_id or group_id is set
CREATE TABLE IF NOT EXISTS resource_holder_permissions (
    id TEXT PRIMARY KEY,
    user_id TEXT REFERENCES users(id) ON DELETE CASCADE,
    group_id TEXT REFERENCES user_groups(id) ON DELETE CASCADE,
    resource_id TEXT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
    permission_id TEXT NOT NULL REFERENCES resource_permissions(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now')),
    CHECK ((user_id IS NULL) <> (group_id IS NULL))
);

CREATE TABLE IF NOT EXISTS subscription_plans (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    default_units INTEGER NOT NULL DEFAULT 0,
    plan_type TEXT NOT NULL,
    public INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS subscriptions (
    group_id TEXT NOT NULL REFERENCES user_groups(id) ON DELETE CASCADE,
    subscription_plan_id TEXT NOT NULL REFERENCES subscription_plans(id) ON DELETE CASCADE,
    active INTEGER NOT NULL DEFAULT 0,
    units INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_id, subscription_plan_id)
);

CREATE TABLE IF NOT EXISTS user_group_limits (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    group_limit INTEGER NOT NULL
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_scope ON users(username, IFNULL(application_id, ''));
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_scope ON users(normalized_email, IFNULL(application_id, ''));
CREATE UNIQUE INDEX IF NOT EXISTS idx_groups_name_scope ON user_groups(name, IFNULL(parent, ''));
CREATE UNIQUE INDEX IF NOT EXISTS idx_holder_permissions_unique
    ON resource_holder_permissions(IFNULL(user_id, ''), IFNULL(group_id, ''), resource_id, permission_id);
CREATE INDEX IF NOT EXISTS idx_tokens_user ON tokens(user_id);
CREATE INDEX IF NOT EXISTS idx_groups_parent ON user_groups(parent);
CREATE INDEX IF NOT EXISTS idx_group_users_user ON group_users(user_id);
CREATE INDEX IF NOT EXISTS idx_applications_group ON applications(group_id);
CREATE INDEX IF NOT EXISTS idx_resources_application ON resources(application_id);
CREATE INDEX IF NOT EXISTS idx_holder_permissions_resource ON resource_holder_permissions(resource_id);
"#;
