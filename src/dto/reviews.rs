use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ProductQuestion, Review};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateQuestionRequest {
    pub question: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnswerQuestionRequest {
    pub answer: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ReviewList {
    #[schema(value_type = Vec<Review>)]
    pub items: Vec<Review>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct QuestionList {
    #[schema(value_type = Vec<ProductQuestion>)]
    pub items: Vec<ProductQuestion>,
}
