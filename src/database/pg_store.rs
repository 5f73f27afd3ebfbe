//! `SurveyStore` over the Postgres `survey` schema

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info, warn};

use crate::legacy::normalize_clients;
use crate::model::{
    Answer, AnswerId, Category, CategoryId, Client, ClientId, Question, QuestionId, Survey,
    SurveyId,
};
use crate::store::SurveyStore;

/// JSONB columns stay untyped so one malformed value cannot fail the query
#[derive(Debug, FromRow)]
struct ClientRow {
    client_id: String,
    gender: Option<String>,
    age: Option<i64>,
    answers: Json<Value>,
    recommended_categories: Json<Value>,
}

impl ClientRow {
    fn into_document(self) -> Value {
        json!({
            "id": self.client_id,
            "gender": self.gender,
            "age": self.age,
            "answers": self.answers.0,
            "recommended_categories": self.recommended_categories.0,
        })
    }
}

/// Normalize client rows, dropping malformed answer entries and rows
fn clients_from_rows(rows: Vec<ClientRow>) -> Vec<Client> {
    let documents: Vec<Value> = rows.into_iter().map(ClientRow::into_document).collect();
    let import = normalize_clients(&documents);

    for (index, error) in &import.rejected {
        warn!("Skipping client row {}: {}", index, error);
    }
    for error in &import.incomplete_answers {
        warn!("Dropping answer entry: {}", error);
    }
    import.clients
}

#[derive(Debug, FromRow)]
struct SurveyRow {
    survey_id: String,
    name: String,
    question_ids: Json<Vec<QuestionId>>,
    active: bool,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    question_id: String,
    text: String,
    answer_ids: Json<Vec<AnswerId>>,
}

#[derive(Debug, FromRow)]
struct AnswerRow {
    answer_id: String,
    text: String,
    category_id: Option<String>,
    weight: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    category_id: String,
    name: String,
}

#[derive(Clone, Debug)]
pub struct PgSurveyStore {
    pool: PgPool,
}

impl PgSurveyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SurveyStore for PgSurveyStore {
    async fn load_clients(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(
            r#"SELECT client_id, gender, age, answers, recommended_categories
               FROM survey.clients ORDER BY client_id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load clients")?;
        debug!("Loaded {} client rows", rows.len());
        Ok(clients_from_rows(rows))
    }

    async fn load_surveys(&self) -> Result<Vec<Survey>> {
        let rows = sqlx::query_as::<_, SurveyRow>(
            r#"SELECT survey_id, name, question_ids, active
               FROM survey.surveys ORDER BY survey_id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load surveys")?;
        Ok(rows
            .into_iter()
            .map(|r| Survey {
                id: SurveyId::from(r.survey_id),
                name: r.name,
                question_ids: r.question_ids.0,
                active: r.active,
            })
            .collect())
    }

    async fn load_questions(&self) -> Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT question_id, text, answer_ids
               FROM survey.questions ORDER BY question_id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load questions")?;
        Ok(rows
            .into_iter()
            .map(|r| Question {
                id: QuestionId::from(r.question_id),
                text: r.text,
                answer_ids: r.answer_ids.0,
            })
            .collect())
    }

    async fn load_answers(&self) -> Result<Vec<Answer>> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"SELECT answer_id, text, category_id, weight
               FROM survey.answers ORDER BY answer_id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load answers")?;
        Ok(rows
            .into_iter()
            .map(|r| Answer {
                id: AnswerId::from(r.answer_id),
                text: r.text,
                category_id: r.category_id.map(CategoryId::from),
                weight: r.weight,
            })
            .collect())
    }

    async fn load_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            r#"SELECT category_id, name FROM survey.categories ORDER BY category_id"#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load categories")?;
        Ok(rows
            .into_iter()
            .map(|r| Category {
                id: CategoryId::from(r.category_id),
                name: r.name,
            })
            .collect())
    }

    async fn save_client_recommendations(
        &self,
        client_id: &ClientId,
        categories: &[CategoryId],
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"UPDATE survey.clients
               SET recommended_categories = $2, updated_at = NOW()
               WHERE client_id = $1"#,
        )
        .bind(client_id.as_str())
        .bind(Json(categories))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save recommendations for client {}", client_id))?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(
                "Saved {} recommended categories for client {}",
                categories.len(),
                client_id
            );
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClientAnswer, Gender};

    fn row(client_id: &str, answers: Value, recommended: Value) -> ClientRow {
        ClientRow {
            client_id: client_id.to_string(),
            gender: Some("female".to_string()),
            age: Some(34),
            answers: Json(answers),
            recommended_categories: Json(recommended),
        }
    }

    #[test]
    fn test_malformed_jsonb_values_do_not_drop_clients() {
        let clients = clients_from_rows(vec![
            row(
                "c1",
                json!([{"questionId": "q1", "answerId": "a1"}, {"questionId": "q2"}]),
                json!(["citrus", null, 7]),
            ),
            row("c2", json!("not an array"), json!(null)),
            row("", json!([]), json!([])),
        ]);

        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].id.as_str(), "c1");
        assert_eq!(clients[0].gender, Gender::Female);
        assert_eq!(clients[0].age, Some(34));
        assert_eq!(clients[0].answers, vec![ClientAnswer::new("q1", "a1")]);
        assert_eq!(
            clients[0].recommended_categories,
            vec![CategoryId::from("citrus")]
        );
        assert!(clients[1].answers.is_empty());
        assert!(clients[1].recommended_categories.is_empty());
    }
}
