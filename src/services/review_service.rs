use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    dto::reviews::{
        AnswerQuestionRequest, CreateQuestionRequest, CreateReviewRequest, QuestionList,
        ReviewList,
    },
    entity::{
        product_questions::{
            ActiveModel as QuestionActive, Column as QuestionCol, Entity as ProductQuestions,
        },
        products::{Entity as Products, Model as ProductModel},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_supplier},
    models::{ProductQuestion, Review},
    response::{ApiResponse, Meta},
    state::AppState,
};

fn validate_rating(rating: i32) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }
    Ok(())
}

async fn find_product(state: &AppState, product_id: Uuid) -> AppResult<ProductModel> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    find_product(state, product_id).await?;
    let items = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();
    Ok(ApiResponse::success("Reviews", ReviewList { items }, Some(Meta::empty())))
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    validate_rating(payload.rating)?;
    let product = find_product(state, product_id).await?;
    if product.supplier_id == user.user_id {
        return Err(AppError::Forbidden);
    }

    let inserted = ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(payload.comment.unwrap_or_default().trim().to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await;

    let review = match inserted {
        Ok(review) => review,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::Conflict("product already reviewed".into()));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        state,
        user.user_id,
        "review_create",
        "reviews",
        serde_json::json!({ "product_id": product.id, "rating": review.rating }),
    )
    .await;

    Ok(ApiResponse::success(
        "Review added",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

pub async fn list_questions(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<QuestionList>> {
    find_product(state, product_id).await?;
    let items = ProductQuestions::find()
        .filter(QuestionCol::ProductId.eq(product_id))
        .order_by_desc(QuestionCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductQuestion::from)
        .collect();
    Ok(ApiResponse::success(
        "Questions",
        QuestionList { items },
        Some(Meta::empty()),
    ))
}

pub async fn add_question(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateQuestionRequest,
) -> AppResult<ApiResponse<ProductQuestion>> {
    let question = payload.question.trim();
    if question.is_empty() {
        return Err(AppError::validation("question is required"));
    }
    let product = find_product(state, product_id).await?;

    let question = QuestionActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        user_id: Set(user.user_id),
        question: Set(question.to_string()),
        answer: Set(None),
        answered_at: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Question added",
        ProductQuestion::from(question),
        Some(Meta::empty()),
    ))
}

/// Only the supplier who owns the product may answer; a new answer replaces the old one.
pub async fn answer_question(
    state: &AppState,
    user: &AuthUser,
    question_id: Uuid,
    payload: AnswerQuestionRequest,
) -> AppResult<ApiResponse<ProductQuestion>> {
    ensure_supplier(user)?;
    let answer = payload.answer.trim();
    if answer.is_empty() {
        return Err(AppError::validation("answer is required"));
    }

    let question = ProductQuestions::find_by_id(question_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = find_product(state, question.product_id).await?;
    if product.supplier_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut active: QuestionActive = question.into();
    active.answer = Set(Some(answer.to_string()));
    active.answered_at = Set(Some(Utc::now().into()));
    let question = active.update(&state.orm).await?;

    audit::record(
        state,
        user.user_id,
        "question_answer",
        "product_questions",
        serde_json::json!({ "question_id": question.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Answer saved",
        ProductQuestion::from(question),
        Some(Meta::empty()),
    ))
}
