use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_message_data_and_meta() {
        let body = ApiResponse::success("Orders", vec![1, 2], Some(Meta::new(2, 20, 41)));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "Orders");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["meta"]["page"], 2);
        assert_eq!(json["meta"]["total"], 41);
    }

    #[test]
    fn empty_meta_serializes_nulls() {
        let json = serde_json::to_value(Meta::empty()).unwrap();
        assert!(json["page"].is_null());
        assert!(json["per_page"].is_null());
    }
}
