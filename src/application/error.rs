use thiserror::Error;

use crate::domain::Grams;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Matricula already registered: {0}")]
    DuplicateMatricula(String),

    #[error("Not enough coffee in stock: {available}g available, {required}g per dose")]
    InsufficientStock { available: Grams, required: Grams },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}
