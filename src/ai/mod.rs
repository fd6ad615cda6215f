//! Módulo de integración con IA
//!
//! Proporciona funcionalidades para:
//! - Consultas a diferentes proveedores de IA con historial de mensajes
//! - Espera acotada cuando el servicio está ocupado y fallback entre modelos
//! - Extracción del diagrama desde la respuesta del modelo

pub mod client;
pub mod providers;
pub mod utils;

pub use client::AiGenerator;
pub use utils::extraer_diagrama;
