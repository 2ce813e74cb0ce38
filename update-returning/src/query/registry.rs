//! Maps a query shape to its row-returning counterpart.

use super::QueryShape;

/// Static shape table: read shape on the left, returning shape on the right.
const RETURNING_SHAPES: &[(QueryShape, QueryShape)] = &[
    (QueryShape::Entity, QueryShape::ReturningEntity),
    (QueryShape::Values, QueryShape::ReturningValues),
    (QueryShape::ValuesList, QueryShape::ReturningValuesList),
];

/// Lookup of row-returning shapes.
///
/// Unregistered shapes resolve to themselves; deciding whether that is
/// acceptable is up to the caller.
///
/// ```
/// use update_returning::{QueryShape, QueryShapeRegistry};
///
/// let registry = QueryShapeRegistry::new();
/// assert_eq!(registry.resolve(QueryShape::Values), QueryShape::ReturningValues);
/// assert_eq!(registry.resolve(QueryShape::Empty), QueryShape::Empty);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct QueryShapeRegistry {
    table: &'static [(QueryShape, QueryShape)],
}

impl QueryShapeRegistry {
    /// Registry with the built-in shape table.
    pub const fn new() -> Self {
        Self {
            table: RETURNING_SHAPES,
        }
    }

    /// Registry over a caller-provided table of `(read, returning)` pairs.
    pub const fn with_table(table: &'static [(QueryShape, QueryShape)]) -> Self {
        Self { table }
    }

    /// Returning counterpart of `shape`, or `shape` itself when unregistered.
    pub fn resolve(&self, shape: QueryShape) -> QueryShape {
        self.table
            .iter()
            .find(|(from, _)| *from == shape)
            .map_or(shape, |(_, to)| *to)
    }

    /// Whether `shape` has a returning counterpart.
    pub fn is_registered(&self, shape: QueryShape) -> bool {
        self.table.iter().any(|(from, _)| *from == shape)
    }
}

impl Default for QueryShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_shapes_resolve() {
        let registry = QueryShapeRegistry::new();
        assert_eq!(
            registry.resolve(QueryShape::Entity),
            QueryShape::ReturningEntity
        );
        assert_eq!(
            registry.resolve(QueryShape::ValuesList),
            QueryShape::ReturningValuesList
        );
    }

    #[test]
    fn test_unregistered_shape_is_unchanged() {
        let registry = QueryShapeRegistry::new();
        assert!(!registry.is_registered(QueryShape::Empty));
        assert_eq!(registry.resolve(QueryShape::Empty), QueryShape::Empty);
    }

    #[test]
    fn test_returning_shapes_resolve_to_themselves() {
        let registry = QueryShapeRegistry::new();
        for shape in [
            QueryShape::ReturningEntity,
            QueryShape::ReturningValues,
            QueryShape::ReturningValuesList,
        ] {
            assert_eq!(registry.resolve(shape), shape);
            assert!(shape.is_returning());
        }
    }

    #[test]
    fn test_custom_table() {
        static VALUES_ONLY: &[(QueryShape, QueryShape)] =
            &[(QueryShape::Values, QueryShape::ReturningValues)];
        let registry = QueryShapeRegistry::with_table(VALUES_ONLY);
        assert!(registry.is_registered(QueryShape::Values));
        assert_eq!(registry.resolve(QueryShape::Entity), QueryShape::Entity);
    }
}
