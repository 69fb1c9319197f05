// Tables the poller reads and writes. Created on startup when missing.

use sqlx::SqlitePool;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS host (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ip TEXT NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        info TEXT NOT NULL DEFAULT '{}',
        active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS host_item (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host_id INTEGER NOT NULL REFERENCES host(id) ON DELETE CASCADE,
        sn TEXT NOT NULL,
        name TEXT NOT NULL,
        oldid TEXT,
        serial TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_host_item_host_sn ON host_item(host_id, sn)",
    "CREATE INDEX IF NOT EXISTS idx_host_item_oldid ON host_item(oldid, name)",
    r#"
    CREATE TABLE IF NOT EXISTS measurement_int (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES host_item(id) ON DELETE CASCADE,
        value REAL NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_measurement_int_item ON measurement_int(item_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS measurement_text (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES host_item(id) ON DELETE CASCADE,
        value TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_measurement_text_item ON measurement_text(item_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS traffic_onu (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sn TEXT NOT NULL,
        kbup INTEGER NOT NULL,
        kbdw INTEGER NOT NULL,
        pkup INTEGER NOT NULL,
        pkdw INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS icmp (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        item_id INTEGER NOT NULL REFERENCES host_item(id) ON DELETE CASCADE,
        value REAL NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_icmp_item ON icmp(item_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS pending_onu (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        host_ip TEXT NOT NULL,
        synced INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS documentation (
        ip TEXT NOT NULL,
        name TEXT NOT NULL,
        present INTEGER NOT NULL DEFAULT 1
    )
    "#,
];

pub(super) async fn create_all(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
