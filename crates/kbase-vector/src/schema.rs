use arrow_schema::{DataType, Field, Schema, SchemaRef};
use std::sync::Arc;

pub const ID_COL: &str = "id";
pub const DOCUMENT_COL: &str = "document";
pub const METADATA_COL: &str = "metadata";
pub const VECTOR_COL: &str = "vector";
pub const DISTANCE_COL: &str = "_distance";

/// Collection table layout. Metadata is stored as a JSON object string.
pub fn build_collection_schema(dim: usize) -> SchemaRef {
	Arc::new(Schema::new(vec![
		Field::new(ID_COL, DataType::Utf8, false),
		Field::new(DOCUMENT_COL, DataType::Utf8, false),
		Field::new(METADATA_COL, DataType::Utf8, false),
		Field::new(VECTOR_COL, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}

/// Vector width recorded in an existing table's schema.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
	match schema.field_with_name(VECTOR_COL).ok()?.data_type() {
		DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
		_ => None,
	}
}
