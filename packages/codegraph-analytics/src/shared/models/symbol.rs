//! Symbol model and parser input records
//!
//! Symbols arrive from an external parser as `ParseResult` records, one per
//! file. The engine treats them as immutable from the moment a node is added:
//! graphs and their clones share `Arc<Symbol>` references and never write
//! through them.
//!
//! Symbol IDs are opaque strings supplied by the parser (file path + position
//! + name) and are used verbatim as node IDs. Name collisions across packages
//! are expected; identity is by ID only.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::location::Location;

/// Symbol classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Unknown,
    Function,
    Method,
    Struct,
    Class,
    Interface,
    Type,
    Package,
    Variable,
    Constant,
    Field,
    /// Placeholder for an unresolved external symbol
    External,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Unknown => "unknown",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Struct => "struct",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Package => "package",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::Field => "field",
            SymbolKind::External => "external",
        }
    }

    /// Callable symbols participate in call-edge resolution
    #[inline]
    pub fn is_callable(&self) -> bool {
        matches!(self, SymbolKind::Function | SymbolKind::Method)
    }

    /// Type-like symbols can receive methods and implement interfaces
    #[inline]
    pub fn is_type_like(&self) -> bool {
        matches!(
            self,
            SymbolKind::Struct | SymbolKind::Class | SymbolKind::Type | SymbolKind::Interface
        )
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed method signature attached to a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Vec<String>,
    pub receiver: Option<String>,
    pub param_count: usize,
    pub return_count: usize,
}

/// Optional structured metadata a parser may attach to a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SymbolMetadata {
    /// Return type expression, as written in source
    pub return_type: Option<String>,
    /// Extended/embedded base type
    pub extends: Option<String>,
    /// Interfaces the symbol declares it implements
    pub implements: Vec<String>,
    /// Methods declared on the symbol (interfaces and types)
    pub methods: Vec<MethodSignature>,
}

/// Recorded function-application expression inside a symbol body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// Call target as written (`Fn`, `pkg.Fn`, `recv.Method`)
    pub target: String,
    /// Receiver expression for method calls
    pub receiver: Option<String>,
    /// Parser flagged this as a method call
    pub is_method: bool,
    pub location: Location,
}

impl CallSite {
    pub fn new(target: impl Into<String>, location: Location) -> Self {
        Self {
            target: target.into(),
            receiver: None,
            is_method: false,
            location,
        }
    }

    pub fn method(
        target: impl Into<String>,
        receiver: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            target: target.into(),
            receiver: Some(receiver.into()),
            is_method: true,
            location,
        }
    }
}

/// Program symbol supplied by the external parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Stable opaque ID (file path + position + name)
    pub id: String,
    /// Unqualified name
    pub name: String,
    pub kind: SymbolKind,
    /// Source language tag (`go`, `python`, ...)
    pub language: String,
    /// Package path; may be empty for files outside any package
    pub package: String,
    pub file_path: String,
    pub exported: bool,
    pub location: Location,
    /// Receiver type for methods (`*Repo`, `Repo`)
    pub receiver: Option<String>,
    /// Raw signature string, when the parser captured one
    pub signature: Option<String>,
    pub metadata: Option<SymbolMetadata>,
    pub call_sites: Vec<CallSite>,
    /// Nested symbols (methods in a type, types in a file, ...)
    pub children: Vec<Symbol>,
}

impl Symbol {
    /// Minimal symbol; builder-style setters fill the rest
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: SymbolKind,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            language: String::new(),
            package: String::new(),
            file_path: file_path.into(),
            exported: false,
            location: Location::zero(),
            receiver: None,
            signature: None,
            metadata: None,
            call_sites: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = Some(receiver.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_metadata(mut self, metadata: SymbolMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_call_sites(mut self, call_sites: Vec<CallSite>) -> Self {
        self.call_sites = call_sites;
        self
    }

    pub fn with_children(mut self, children: Vec<Symbol>) -> Self {
        self.children = children;
        self
    }

    /// Structural validity: non-empty ID/name, a file path without traversal
    /// segments, and valid children. Placeholder symbols skip the file check.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("symbol has empty id".to_string());
        }
        if self.name.is_empty() {
            return Err(format!("symbol {} has empty name", self.id));
        }
        if self.kind != SymbolKind::External {
            if self.file_path.is_empty() {
                return Err(format!("symbol {} has empty file path", self.id));
            }
            if self.file_path.contains("..") {
                return Err(format!(
                    "symbol {} has path traversal in file path: {}",
                    self.id, self.file_path
                ));
            }
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }

    /// Method names declared in metadata (used by interface matching)
    pub fn declared_method_names(&self) -> Vec<&str> {
        self.metadata
            .as_ref()
            .map(|m| m.methods.iter().map(|s| s.name.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Shared, immutable symbol reference
pub type SymbolRef = Arc<Symbol>;

/// Import statement recorded by the parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Imported package path
    pub path: String,
    pub location: Location,
}

impl Import {
    pub fn new(path: impl Into<String>, location: Location) -> Self {
        Self {
            path: path.into(),
            location,
        }
    }
}

/// Per-file parse output: the engine's sole input record
///
/// `symbols` entries may be `None` (parsers emit null slots for constructs
/// they gave up on); those are skipped during collection, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub file_path: String,
    pub language: String,
    pub imports: Vec<Import>,
    pub symbols: Vec<Option<Symbol>>,
}

impl ParseResult {
    pub fn new(file_path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            language: language.into(),
            imports: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn with_imports(mut self, imports: Vec<Import>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols.into_iter().map(Some).collect();
        self
    }

    /// Boundary validation: rejects empty and traversal-bearing paths
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("parse result has empty file path".to_string());
        }
        if self.file_path.contains("..") {
            return Err(format!(
                "parse result has path traversal in file path: {}",
                self.file_path
            ));
        }
        for symbol in self.symbols.iter().flatten() {
            symbol.validate()?;
        }
        Ok(())
    }
}
