use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use gestularia_core::analytics::AnalyticsError;
use gestularia_core::pricing::PricingError;
use gestularia_core::validation::ValidationError;
use gestularia_storage::{OrderError, ProductError, StoreError, UserError};

use crate::checkout::CheckoutError;

const INTERNAL_MESSAGE: &str = "Error interno del servidor";

/// Error returned by every API handler, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No autorizado")]
    Unauthenticated,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    /// The detail is logged and never sent to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Internal(detail) => {
                error!(stage = "app", error = %detail, "request failed");
                INTERNAL_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(stage = "app", error = %rejection.body_text(), "rejected request body");
        Self::Validation("El cuerpo de la solicitud no es JSON válido".to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let message = match err {
            ValidationError::Required(field) => format!("El campo {field} es obligatorio"),
            ValidationError::InvalidSlug => "El slug solo puede contener letras minúsculas, \
                 números y guiones, sin empezar ni terminar en guion (máximo 63 caracteres)"
                .to_string(),
            ValidationError::ReservedSlug(slug) => format!("El slug {slug} está reservado"),
            ValidationError::InvalidColor(color) => {
                format!("El color {color} no es un valor hexadecimal válido")
            }
            ValidationError::NegativePrice => {
                "El precio debe ser un número mayor o igual a cero".to_string()
            }
        };
        Self::Validation(message)
    }
}

impl From<PricingError> for ApiError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::MissingFields => Self::validation("Faltan campos requeridos"),
            PricingError::InvalidQuantity { .. } => {
                Self::validation("La cantidad de cada producto debe ser un entero positivo")
            }
            PricingError::ProductNotFoundOrForeign => {
                Self::not_found("Algunos productos no fueron encontrados")
            }
            PricingError::TotalOverflow => {
                Self::validation("El total del pedido está fuera de rango")
            }
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlugTaken => Self::Conflict("Este slug ya está en uso".to_string()),
            StoreError::OwnerAlreadyHasStore => {
                Self::Conflict("Ya tienes una tienda creada".to_string())
            }
            StoreError::Database(err) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ProductError> for ApiError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::InUse => Self::Conflict(
                "No se puede eliminar un producto que forma parte de pedidos".to_string(),
            ),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Pricing(err) => err.into(),
            CheckoutError::OrderNotFound => Self::not_found("Pedido no encontrado"),
            CheckoutError::Products(err) => err.into(),
            CheckoutError::Orders(err) => err.into(),
        }
    }
}
