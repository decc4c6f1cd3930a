use crate::{
    domain::ValueDomain,
    types::{AttributeId, IndexId, TableId},
};
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

///
/// Catalog models
///
/// Runtime-only descriptors for the storage objects the compiler plans
/// against. The catalog collaborator owns resolution; the compiler consumes
/// these read-only shapes and never mutates them.
///

///
/// AttributeModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeModel {
    pub id: AttributeId,
    pub name: String,
    pub domain: ValueDomain,
    /// Position within the owning table's declared attribute order.
    pub position: u32,
}

///
/// IndexModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexModel {
    pub id: IndexId,
    pub name: String,
    pub table: TableId,
    /// Indexed attributes in key order; order is significant.
    pub attributes: Vec<AttributeId>,
    pub unique: bool,
}

impl IndexModel {
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.attributes.len() > 1
    }

    /// Key position of an attribute within this index, if indexed.
    #[must_use]
    pub fn key_position(&self, attribute: AttributeId) -> Option<usize> {
        self.attributes.iter().position(|id| *id == attribute)
    }
}

impl Display for IndexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unique {
            write!(f, "UNIQUE {}[{}]", self.name, self.attributes.len())
        } else {
            write!(f, "{}[{}]", self.name, self.attributes.len())
        }
    }
}

///
/// PartitionKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartitionKind {
    Hash,
    Range,
    List,
}

///
/// PartitionInfo
///
/// Partitioning metadata for a table; consumed opaquely and copied onto
/// table access specs for the execution engine.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PartitionInfo {
    pub kind: PartitionKind,
    pub attribute: AttributeId,
    pub partition_count: u32,
}

///
/// TableModel
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableModel {
    pub id: TableId,
    pub name: String,
    /// Ordered attribute list (authoritative for projection ordering).
    pub attributes: Vec<AttributeModel>,
    pub indexes: Vec<IndexModel>,
    pub partitions: Option<PartitionInfo>,
}

impl TableModel {
    #[must_use]
    pub fn attribute(&self, id: AttributeId) -> Option<&AttributeModel> {
        self.attributes.iter().find(|attr| attr.id == id)
    }

    #[must_use]
    pub fn attribute_by_name(&self, name: &str) -> Option<&AttributeModel> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    #[must_use]
    pub fn index(&self, id: IndexId) -> Option<&IndexModel> {
        self.indexes.iter().find(|index| index.id == id)
    }
}

///
/// CatalogError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CatalogError {
    #[error("unknown table: {table}")]
    UnknownTable { table: TableId },

    #[error("unknown index {index} on table {table}")]
    UnknownIndex { table: TableId, index: IndexId },

    #[error("unknown attribute {attribute} on table {table}")]
    UnknownAttribute {
        table: TableId,
        attribute: AttributeId,
    },
}

///
/// Catalog
///
/// The consumed storage-catalog interface: attribute/index/partition
/// resolution. Implementations must be deterministic within one
/// compilation.
///

pub trait Catalog {
    fn table(&self, id: TableId) -> Result<&TableModel, CatalogError>;

    fn index(&self, table: TableId, index: IndexId) -> Result<&IndexModel, CatalogError> {
        self.table(table)?
            .index(index)
            .ok_or(CatalogError::UnknownIndex { table, index })
    }

    fn attribute(
        &self,
        table: TableId,
        attribute: AttributeId,
    ) -> Result<&AttributeModel, CatalogError> {
        self.table(table)?
            .attribute(attribute)
            .ok_or(CatalogError::UnknownAttribute { table, attribute })
    }

    fn partitions(&self, table: TableId) -> Result<Option<&PartitionInfo>, CatalogError> {
        Ok(self.table(table)?.partitions.as_ref())
    }
}
