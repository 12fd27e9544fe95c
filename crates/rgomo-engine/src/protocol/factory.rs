//! ダイアレクト名からプロトコルを組み立てる
//!
//! 組み込みは `gomocup` のみ。新しいダイアレクトは [`ProtocolFactory::register`] で追加し、
//! 既存のダイアレクト実装には手を入れない。

use std::sync::Arc;

use super::gomocup::GomocupDialect;
use super::{Dialect, Protocol, Transport};
use crate::error::{EngineError, Result};

/// ダイアレクトの登録表
#[derive(Clone)]
pub struct ProtocolFactory {
    dialects: Vec<Arc<dyn Dialect>>,
}

impl ProtocolFactory {
    /// 何も登録されていない表
    pub fn empty() -> Self {
        Self { dialects: Vec::new() }
    }

    /// ダイアレクトを追加する。同名があれば置き換える。
    pub fn register<D: Dialect + 'static>(&mut self, dialect: D) -> &mut Self {
        self.dialects.retain(|d| d.name() != dialect.name());
        self.dialects.push(Arc::new(dialect));
        self
    }

    pub fn dialect(&self, name: &str) -> Result<Arc<dyn Dialect>> {
        self.dialects
            .iter()
            .find(|d| d.name() == name)
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedDialect(name.to_string()))
    }

    pub fn create(&self, name: &str, transport: Arc<dyn Transport>) -> Result<Box<dyn Protocol>> {
        Ok(self.dialect(name)?.create(transport))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialects.iter().map(|d| d.name())
    }
}

impl Default for ProtocolFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register(GomocupDialect::new());
        factory
    }
}
