use jobdash::settings::Database as DbCfg;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

#[allow(dead_code)]
impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let cfg = DbCfg {
            url: format!("sqlite://{}?mode=rwc", db_path),
        };

        let connection = jobdash::storage::init(&cfg)
            .await
            .expect("Failed to init test database");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Create a month table the way the external job exporter would.
    /// `columns` is the SQL column list, e.g. `AH_RUNTIME REAL, AH_MSGNR INTEGER`.
    pub async fn create_month_table(&self, month: &str, columns: &str) {
        self.connection
            .execute_unprepared(&format!("CREATE TABLE \"{month}\" ({columns})"))
            .await
            .expect("Failed to create month table");
    }

    /// Insert rows given as SQL value tuples, e.g. `(10.0, 0)`.
    pub async fn insert_rows(&self, month: &str, rows: &[&str]) {
        for row in rows {
            self.connection
                .execute_unprepared(&format!("INSERT INTO \"{month}\" VALUES {row}"))
                .await
                .expect("Failed to insert month row");
        }
    }

    /// Month table with the canonical job-log columns.
    pub async fn seed_month(&self, month: &str, rows: &[&str]) {
        self.create_month_table(
            month,
            "AH_RUNTIME REAL, AH_ERT REAL, AH_MSGNR INTEGER, AH_STYPE TEXT, AH_OTYPE TEXT",
        )
        .await;
        self.insert_rows(month, rows).await;
    }
}
