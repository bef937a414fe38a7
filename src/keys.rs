use crate::error::{Result, ValidationError};
use crate::schema::Schema;
use crate::tree::{DataTree, NodeId};

/// Check that the first children of a list instance are its keys, in the
/// order the schema declares them
pub fn check_keys(schema: &Schema, tree: &DataTree, list: NodeId) -> Result<()> {
    let list_schema = tree.get(list)?.schema();
    let mut child = tree.first_child(list);

    for &key in schema.node(list_schema).keys() {
        match child {
            Some(c) if tree.get(c)?.schema() == key => child = tree.next_sibling(c),
            _ => {
                // key not at its position; tell a misplaced key from a missing one
                let mut rest = child;
                while let Some(c) = rest {
                    if tree.get(c)?.schema() == key {
                        return Err(ValidationError::MisplacedKey {
                            key: schema.name(key).to_string(),
                            list: schema.name(list_schema).to_string(),
                        });
                    }
                    rest = tree.next_sibling(c);
                }
                return Err(ValidationError::MissingElement {
                    element: schema.name(key).to_string(),
                    parent: schema.name(list_schema).to_string(),
                });
            }
        }
    }
    Ok(())
}
