use sqlx::MySqlPool;
use tracing::info;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    MySqlPool::connect(database_url).await
}

const SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS shifts (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        start_time TIME NOT NULL,
        end_time TIME NOT NULL,
        late_after_min INT UNSIGNED NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_id BIGINT UNSIGNED NOT NULL,
        day DATE NOT NULL,
        checkin_time DATETIME NULL,
        checkin_latitude DOUBLE NULL,
        checkin_longitude DOUBLE NULL,
        checkin_address VARCHAR(500) NULL,
        checkin_evidence VARCHAR(1000) NULL,
        checkin_device VARCHAR(255) NULL,
        checkout_time DATETIME NULL,
        checkout_latitude DOUBLE NULL,
        checkout_longitude DOUBLE NULL,
        checkout_address VARCHAR(500) NULL,
        checkout_evidence VARCHAR(1000) NULL,
        checkout_device VARCHAR(255) NULL,
        shift_id BIGINT UNSIGNED NULL,
        work_status VARCHAR(20) NULL,
        leave_status VARCHAR(20) NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_attendance_employee_day (employee_id, day),
        KEY idx_attendance_day (day)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leave_requests (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_id BIGINT UNSIGNED NOT NULL,
        leave_type VARCHAR(20) NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        reason VARCHAR(500) NULL,
        status VARCHAR(20) NOT NULL DEFAULT 'pending',
        reviewed_by BIGINT UNSIGNED NULL,
        reviewed_at TIMESTAMP NULL,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        KEY idx_leave_employee (employee_id),
        KEY idx_leave_status (status)
    )
    "#,
];

/// Creates the tables this service owns if they are missing.
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready");
    Ok(())
}
