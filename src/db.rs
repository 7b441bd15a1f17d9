use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::CompletionTrend;
use crate::stats::Analysis;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Stores the school and per-class averages of one run. Recording the same
/// week label and reference date again replaces the earlier snapshot.
pub async fn record_snapshot(
    pool: &PgPool,
    analysis: &Analysis,
    week_label: &str,
) -> anyhow::Result<Uuid> {
    let mut tx = pool.begin().await?;

    let run_id: Uuid = sqlx::query(
        r#"
        INSERT INTO weekly_completion.runs
        (id, week_label, reference_date, window_start, school_average,
         eligible_records, distinct_students)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (week_label, reference_date) DO UPDATE
        SET window_start = EXCLUDED.window_start,
            school_average = EXCLUDED.school_average,
            eligible_records = EXCLUDED.eligible_records,
            distinct_students = EXCLUDED.distinct_students,
            recorded_at = now()
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(week_label)
    .bind(analysis.reference_date)
    .bind(analysis.window_start)
    .bind(analysis.school.average_completion)
    .bind(analysis.school.eligible_records as i64)
    .bind(analysis.school.distinct_students as i64)
    .fetch_one(&mut *tx)
    .await?
    .get("id");

    sqlx::query("DELETE FROM weekly_completion.class_snapshots WHERE run_id = $1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    for class in analysis.class_stats() {
        sqlx::query(
            r#"
            INSERT INTO weekly_completion.class_snapshots
            (id, run_id, subject, class_label, enrolled, eligible, average_completion, band)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(run_id)
        .bind(&class.subject)
        .bind(&class.class_label)
        .bind(class.enrolled as i64)
        .bind(class.eligible as i64)
        .bind(class.average_completion)
        .bind(class.band.label())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(run_id)
}

/// Week-over-week completion, newest first. The average is weighted by
/// eligible students so it matches the record-level mean of the run.
pub async fn fetch_trends(
    pool: &PgPool,
    subject: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<CompletionTrend>> {
    let rows = sqlx::query(
        r#"
        SELECT r.week_label, r.reference_date,
               SUM(c.average_completion * c.eligible)
                   / NULLIF(SUM(c.eligible), 0) AS average_completion,
               COALESCE(SUM(c.eligible), 0)::BIGINT AS eligible_records,
               COUNT(c.id) AS class_count
        FROM weekly_completion.runs r
        LEFT JOIN weekly_completion.class_snapshots c
          ON c.run_id = r.id AND ($1::TEXT IS NULL OR c.subject = $1)
        GROUP BY r.id, r.week_label, r.reference_date
        ORDER BY r.reference_date DESC, r.week_label
        LIMIT $2
        "#,
    )
    .bind(subject)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut trends = Vec::new();
    for row in rows {
        trends.push(CompletionTrend {
            week_label: row.get("week_label"),
            reference_date: row.get("reference_date"),
            average_completion: row.get("average_completion"),
            eligible_records: row.get("eligible_records"),
            class_count: row.get("class_count"),
        });
    }

    Ok(trends)
}
