use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    /// El filtro de hoja rechazó la imagen.
    #[error("La imagen no parece contener una hoja")]
    NotALeaf,
    /// Falta un artefacto de modelo en disco (situación recuperable).
    #[error("Modelo no disponible: {0}")]
    ModelUnavailable(String),
    #[error("Error de operación: {0}")]
    OperationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
