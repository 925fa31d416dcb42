//! Model inheritance resolution.

use crate::error::{PipelineError, Result};
use crate::resource_pack::model::normalize_model_name;
use crate::resource_pack::{BlockModel, ExtractedModel, ModelElement};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Bound on `#variable` hops when resolving a texture reference.
const MAX_TEXTURE_INDIRECTION: usize = 32;

/// A model after its parent chain has been merged in.
#[derive(Debug, Clone)]
pub struct FlattenedModel {
    /// Texture variables, still possibly `#`-prefixed.
    pub textures: BTreeMap<String, String>,
    pub elements: Vec<ModelElement>,
    pub ambient_occlusion: bool,
}

/// Resolves model inheritance chains against a table of named models.
pub struct ModelResolver<'a> {
    models: HashMap<String, &'a BlockModel>,
    cache: RefCell<HashMap<String, Rc<FlattenedModel>>>,
}

impl<'a> ModelResolver<'a> {
    pub fn new(models: &'a [ExtractedModel]) -> Self {
        Self {
            models: models
                .iter()
                .map(|m| (normalize_model_name(&m.name), &m.model))
                .collect(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a model with all inherited properties.
    ///
    /// Returns `Ok(None)` for a model the table does not know.
    pub fn resolve(&self, reference: &str) -> Result<Option<Rc<FlattenedModel>>> {
        let name = normalize_model_name(reference);
        if !self.models.contains_key(&name) {
            return Ok(None);
        }
        let mut path = Vec::new();
        self.resolve_internal(&name, &mut path).map(Some)
    }

    fn resolve_internal(&self, name: &str, path: &mut Vec<String>) -> Result<Rc<FlattenedModel>> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(Rc::clone(cached));
        }

        if path.iter().any(|visited| visited == name) {
            let mut chain = path.clone();
            chain.push(name.to_string());
            return Err(PipelineError::CyclicModelReference { chain });
        }

        let Some(model) = self.models.get(name) else {
            // Callers check the root; only parents reach here.
            return Ok(Rc::new(FlattenedModel {
                textures: BTreeMap::new(),
                elements: Vec::new(),
                ambient_occlusion: true,
            }));
        };

        let parent = match model.parent_name() {
            // builtin/generated, builtin/entity and friends end the chain.
            Some(parent) if parent.starts_with("builtin/") => None,
            Some(parent) if !self.models.contains_key(&parent) => {
                tracing::warn!(model = %name, parent = %parent, "parent model not found");
                None
            }
            other => other,
        };

        path.push(name.to_string());
        let parent = match parent {
            Some(parent) => Some(self.resolve_internal(&parent, path)?),
            None => None,
        };
        path.pop();

        let flattened = Rc::new(merge_models(parent.as_deref(), model));
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&flattened));
        Ok(flattened)
    }
}

/// Merge a child over its flattened parent.
/// Child properties override parent properties.
fn merge_models(parent: Option<&FlattenedModel>, child: &BlockModel) -> FlattenedModel {
    let mut textures = parent.map(|p| p.textures.clone()).unwrap_or_default();
    for (key, value) in &child.textures {
        textures.insert(key.clone(), value.clone());
    }

    let elements = match &child.elements {
        Some(elements) => elements.clone(),
        None => parent.map(|p| p.elements.clone()).unwrap_or_default(),
    };

    let ambient_occlusion = child
        .ambient_occlusion
        .or(parent.map(|p| p.ambient_occlusion))
        .unwrap_or(true);

    FlattenedModel {
        textures,
        elements,
        ambient_occlusion,
    }
}

/// Follow `#variable` indirection to a concrete texture name.
/// Chains like #side -> #all -> block/stone resolve to `block/stone`.
///
/// Returns `None` when the chain dangles or loops.
pub fn resolve_texture_reference(
    reference: &str,
    textures: &BTreeMap<String, String>,
) -> Option<String> {
    let mut current = reference;
    for _ in 0..MAX_TEXTURE_INDIRECTION {
        match current.strip_prefix('#') {
            Some(variable) => current = textures.get(variable).map(String::as_str)?,
            None => return Some(normalize_model_name(current)),
        }
    }
    None
}
