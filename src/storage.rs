use crate::errors::AppError;
use crate::models::{Company, MaturityScoreRow, ProviderLog, ReceitaCompany, TechSignal};
use crate::scorer::{DigitalSignalView, MaturityReport, SignalBundle, TechSignalView};
use crate::tech_detector::DetectedTech;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Persistence for companies, signals and score runs.
///
/// Sequential queries instead of CTEs, for sqlx compatibility. Tenant
/// isolation is enforced by the database's row-level security, not here.
pub struct IntelStorage {
    pool: PgPool,
}

impl IntelStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Finds a company by normalized CNPJ.
    pub async fn find_company_by_cnpj(&self, cnpj: &str) -> Result<Option<Company>, AppError> {
        let company =
            sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE cnpj = $1 LIMIT 1")
                .bind(cnpj)
                .fetch_optional(&self.pool)
                .await?;

        Ok(company)
    }

    pub async fn get_company(&self, id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(company)
    }

    /// Creates or returns the company for a CNPJ. Idempotent: two calls
    /// with the same CNPJ yield the same row.
    pub async fn upsert_company_by_cnpj(
        &self,
        cnpj: &str,
        website: Option<&str>,
        domain: Option<&str>,
    ) -> Result<Company, AppError> {
        let company = sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, cnpj, website, domain, enriched, created_at)
            VALUES ($1, $2, $3, $4, false, now())
            ON CONFLICT (cnpj) DO UPDATE
                SET website = COALESCE(companies.website, EXCLUDED.website),
                    domain = COALESCE(companies.domain, EXCLUDED.domain),
                    updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cnpj)
        .bind(website)
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(company)
    }

    /// Applies ReceitaWS registry fields onto an existing company.
    pub async fn apply_registry_data(
        &self,
        company_id: Uuid,
        record: &ReceitaCompany,
    ) -> Result<(), AppError> {
        let industry = record
            .atividade_principal
            .first()
            .and_then(|a| a.text.clone());

        sqlx::query(
            r#"
            UPDATE companies
            SET legal_name = COALESCE($2, legal_name),
                trade_name = COALESCE($3, trade_name),
                industry = COALESCE($4, industry),
                headquarters_state = COALESCE($5, headquarters_state),
                headquarters_city = COALESCE($6, headquarters_city),
                raw_data = COALESCE(raw_data, '{}'::jsonb) || jsonb_build_object('receitaws', $7::jsonb),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(&record.nome)
        .bind(&record.fantasia)
        .bind(industry)
        .bind(&record.uf)
        .bind(&record.municipio)
        .bind(serde_json::to_value(record).unwrap_or(json!({})))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Applies Apollo organization data (linkedin, headcount, people).
    pub async fn apply_apollo_data(
        &self,
        company_id: Uuid,
        organization: &Value,
        people_count: usize,
    ) -> Result<(), AppError> {
        let linkedin = organization
            .get("linkedin_url")
            .and_then(|v| v.as_str())
            .map(String::from);
        let employees = organization
            .get("estimated_num_employees")
            .and_then(|v| v.as_i64());

        sqlx::query(
            r#"
            UPDATE companies
            SET linkedin_url = COALESCE($2, linkedin_url),
                employees = COALESCE($3, employees),
                raw_data = COALESCE(raw_data, '{}'::jsonb)
                    || jsonb_build_object('apollo', $4::jsonb)
                    || jsonb_build_object('apollo_people_count', $5::int),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(linkedin)
        .bind(employees)
        .bind(organization)
        .bind(people_count as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores Serper hits as digital-presence signals on raw_data.
    pub async fn apply_digital_signals(
        &self,
        company_id: Uuid,
        hits: &Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE companies
            SET raw_data = COALESCE(raw_data, '{}'::jsonb) || jsonb_build_object('digital_signals', $2::jsonb),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(hits)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn mark_enriched(&self, company_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE companies SET enriched = true, updated_at = now() WHERE id = $1")
            .bind(company_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Appends tech signals. Dedup is best-effort and request-scoped
    /// only: the same tech from the same source is skipped within this
    /// call, but the table itself stays append-only.
    pub async fn insert_tech_signals(
        &self,
        company_id: Uuid,
        techs: &[DetectedTech],
        source: &str,
    ) -> Result<usize, AppError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut inserted = 0usize;

        for tech in techs {
            if !seen.insert(tech.tech_name.as_str()) {
                continue;
            }

            let result = sqlx::query(
                r#"
                INSERT INTO tech_signals (id, company_id, tech_name, category, confidence, source, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, now())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(&tech.tech_name)
            .bind(&tech.category)
            .bind(tech.confidence)
            .bind(source)
            .execute(&self.pool)
            .await;

            match result {
                Ok(_) => inserted += 1,
                Err(e) => {
                    // One bad row must not lose the rest of the batch
                    tracing::error!("Failed to insert tech signal {}: {}", tech.tech_name, e);
                }
            }
        }

        Ok(inserted)
    }

    pub async fn list_tech_signals(&self, company_id: Uuid) -> Result<Vec<TechSignal>, AppError> {
        let signals = sqlx::query_as::<_, TechSignal>(
            "SELECT * FROM tech_signals WHERE company_id = $1 ORDER BY created_at ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(signals)
    }

    /// Rows from the most recent maturity run, overall row included.
    pub async fn latest_maturity_rows(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<MaturityScoreRow>, AppError> {
        let rows = sqlx::query_as::<_, MaturityScoreRow>(
            r#"
            SELECT * FROM maturity_scores
            WHERE company_id = $1
              AND run_id = (
                  SELECT run_id FROM maturity_scores
                  WHERE company_id = $1
                  ORDER BY created_at DESC
                  LIMIT 1
              )
            ORDER BY pillar ASC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Recent provider activity for a company, newest first.
    pub async fn recent_provider_logs(
        &self,
        company_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ProviderLog>, AppError> {
        let logs = sqlx::query_as::<_, ProviderLog>(
            r#"
            SELECT * FROM provider_logs
            WHERE company_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Assembles the scorer input for a company from everything on file.
    ///
    /// Lead/message counts live in the CRM proper and arrive as caller
    /// overrides; everything else is read from our own tables.
    pub async fn load_signal_bundle(
        &self,
        company: &Company,
        leads: u32,
        messages: u32,
    ) -> Result<SignalBundle, AppError> {
        let tech_signals = self
            .list_tech_signals(company.id)
            .await?
            .into_iter()
            .map(|t| TechSignalView {
                name: t.tech_name,
                category: t.category,
            })
            .collect();

        let raw = company.raw_data.as_ref();
        let digital_signals = raw
            .and_then(|r| r.get("digital_signals"))
            .and_then(|d| d.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|_| DigitalSignalView {
                        kind: "search_hit".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let people = raw
            .and_then(|r| r.get("apollo_people_count"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        Ok(SignalBundle {
            tech_signals,
            digital_signals,
            people,
            leads,
            messages,
            website: company.website.clone(),
            linkedin_url: company.linkedin_url.clone(),
            industry: company.industry.clone(),
            employees: company.employees,
        })
    }

    /// Persists a maturity run: one row per pillar, one overall row
    /// carrying the recommendations, then the denormalized score on the
    /// company. No transaction spans these writes; a failed secondary
    /// insert is logged and the run still counts.
    pub async fn insert_maturity_run(
        &self,
        company_id: Uuid,
        report: &MaturityReport,
    ) -> Result<(), AppError> {
        for ps in &report.pillar_scores {
            let result = sqlx::query(
                r#"
                INSERT INTO maturity_scores (id, company_id, run_id, pillar, score, policy_version, evidence, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, now())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(report.run_id)
            .bind(ps.pillar.as_str())
            .bind(ps.score as i32)
            .bind(&report.policy_version)
            .bind(json!({ "rules_fired": ps.evidence }))
            .execute(&self.pool)
            .await;

            if let Err(e) = result {
                tracing::error!(
                    "Failed to insert pillar row {} for run {}: {}",
                    ps.pillar.as_str(),
                    report.run_id,
                    e
                );
            }
        }

        sqlx::query(
            r#"
            INSERT INTO maturity_scores (id, company_id, run_id, pillar, score, policy_version, evidence, created_at)
            VALUES ($1, $2, $3, 'overall', $4, $5, $6, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(report.run_id)
        .bind(report.overall_score as i32)
        .bind(&report.policy_version)
        .bind(json!({
            "classification": report.classification,
            "recommendations": report.recommendations,
        }))
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE companies SET maturity_score = $2, updated_at = now() WHERE id = $1")
            .bind(company_id)
            .bind(report.overall_score as i32)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Fire-and-forget provider telemetry row.
///
/// Spawned so the caller never waits on (or fails because of) the
/// observability write.
pub fn log_provider_call(
    pool: &PgPool,
    company_id: Option<Uuid>,
    provider: &str,
    operation: &str,
    status: &str,
    latency_ms: u64,
) {
    let pool = pool.clone();
    let provider = provider.to_string();
    let operation = operation.to_string();
    let status = status.to_string();

    tokio::spawn(async move {
        let result = sqlx::query(
            r#"
            INSERT INTO provider_logs (id, company_id, provider, operation, status, latency_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(&provider)
        .bind(&operation)
        .bind(&status)
        .bind(latency_ms as i64)
        .execute(&pool)
        .await;

        if let Err(e) = result {
            tracing::warn!("Failed to write provider log ({} {}): {}", provider, operation, e);
        }
    });
}
