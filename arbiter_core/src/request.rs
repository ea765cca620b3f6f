//! The decision request.
//!
//! A request is a set of attribute bags grouped by category, plus optional
//! content blobs addressable by selector paths.

use serde::{Deserialize, Serialize};

use crate::id::{AttributeId, Category, DataType};
use crate::value::{Bag, Value};

/// One attribute carried by a request category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub attribute_id: AttributeId,
    pub issuer: Option<String>,
    pub values: Vec<Value>,

    /// Whether the attribute is echoed back in each result.
    pub include_in_result: bool,
}

impl AttributeEntry {
    pub fn new(attribute_id: impl Into<AttributeId>, values: Vec<Value>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            issuer: None,
            values,
            include_in_result: false,
        }
    }
}

/// The attributes and content of one request category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAttributes {
    pub category: Category,
    pub attributes: Vec<AttributeEntry>,

    /// Free-form content the path resolver selects against.
    pub content: Option<String>,
}

impl CategoryAttributes {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            attributes: Vec::new(),
            content: None,
        }
    }
}

/// A decision request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Request {
    pub categories: Vec<CategoryAttributes>,

    /// Whether each result should list the applicable policy identifiers.
    pub return_policy_id_list: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single attribute value under a category, creating the category
    /// group on first use.
    pub fn with_attribute(
        mut self,
        category: Category,
        attribute_id: impl Into<AttributeId>,
        value: Value,
    ) -> Self {
        self.add_attribute(category, attribute_id, value);
        self
    }

    /// See [`Request::with_attribute`].
    pub fn add_attribute(
        &mut self,
        category: Category,
        attribute_id: impl Into<AttributeId>,
        value: Value,
    ) {
        let attribute_id = attribute_id.into();
        let group = self.category_mut(category);
        if let Some(entry) = group
            .attributes
            .iter_mut()
            .find(|entry| entry.attribute_id == attribute_id && entry.issuer.is_none())
        {
            entry.values.push(value);
        } else {
            group.attributes.push(AttributeEntry::new(attribute_id, vec![value]));
        }
    }

    /// Attach content to a category.
    pub fn with_content(mut self, category: Category, content: impl Into<String>) -> Self {
        self.category_mut(category).content = Some(content.into());
        self
    }

    fn category_mut(&mut self, category: Category) -> &mut CategoryAttributes {
        if let Some(index) = self
            .categories
            .iter()
            .position(|group| group.category == category)
        {
            &mut self.categories[index]
        } else {
            self.categories.push(CategoryAttributes::new(category));
            self.categories.last_mut().unwrap()
        }
    }

    /// Resolve an attribute to a bag, filtering by category, attribute id,
    /// data type and (when given) issuer. Values of other data types under
    /// the same attribute id are skipped, not an error.
    pub fn bag(
        &self,
        category: &Category,
        attribute_id: &AttributeId,
        data_type: &DataType,
        issuer: Option<&str>,
    ) -> Bag {
        let mut bag = Bag::empty(data_type.clone());
        for group in self.categories.iter().filter(|g| &g.category == category) {
            for entry in &group.attributes {
                if &entry.attribute_id != attribute_id {
                    continue;
                }
                if let Some(wanted) = issuer {
                    if entry.issuer.as_deref() != Some(wanted) {
                        continue;
                    }
                }
                for value in &entry.values {
                    if &value.data_type() == data_type {
                        bag.push(value.clone());
                    }
                }
            }
        }
        bag
    }

    /// Get the content blob of a category, if any.
    pub fn content(&self, category: &Category) -> Option<&str> {
        self.categories
            .iter()
            .find(|group| &group.category == category)
            .and_then(|group| group.content.as_deref())
    }

    /// The values of the standard resource identifier attribute, in
    /// document order.
    pub fn resource_ids(&self) -> Vec<Value> {
        let resource_id = AttributeId::resource_id();
        let mut ids = Vec::new();
        for group in self
            .categories
            .iter()
            .filter(|g| g.category == Category::Resource)
        {
            for entry in &group.attributes {
                if entry.attribute_id == resource_id {
                    ids.extend(entry.values.iter().cloned());
                }
            }
        }
        ids
    }

    /// A copy of this request with the resource identifier narrowed to a
    /// single value, used when a multi-resource request is split into
    /// per-resource evaluations.
    pub fn for_resource(&self, resource: &Value) -> Self {
        let resource_id = AttributeId::resource_id();
        let mut narrowed = self.clone();
        for group in narrowed
            .categories
            .iter_mut()
            .filter(|g| g.category == Category::Resource)
        {
            for entry in &mut group.attributes {
                if entry.attribute_id == resource_id {
                    entry.values = vec![resource.clone()];
                }
            }
        }
        narrowed
    }

    /// The category groups containing attributes flagged for echo, with
    /// only those attributes retained.
    pub fn echoed_attributes(&self) -> Vec<CategoryAttributes> {
        let mut echoed = Vec::new();
        for group in &self.categories {
            let attributes: Vec<AttributeEntry> = group
                .attributes
                .iter()
                .filter(|entry| entry.include_in_result)
                .cloned()
                .collect();
            if !attributes.is_empty() {
                echoed.push(CategoryAttributes {
                    category: group.category.clone(),
                    attributes,
                    content: None,
                });
            }
        }
        echoed
    }
}
