//! Named plaintext operands and the bundles handed to the evaluation engine.

use crate::error::{PackError, Result};
use crate::math::scale::Scale;
use crate::math::slots::{SlotVector, SLOTS};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct NamedOperand<const N: usize = SLOTS> {
    pub name: String,
    pub values: SlotVector<N>,
    pub scale: Scale,
}

impl<const N: usize> NamedOperand<N> {
    pub fn new(name: impl Into<String>, values: SlotVector<N>, scale: Scale) -> Self {
        Self {
            name: name.into(),
            values,
            scale,
        }
    }
}

impl<const N: usize> Serialize for NamedOperand<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("NamedOperand", 3)?;
        s.serialize_field("scale", &self.scale.to_string())?;
        s.serialize_field("scale_f64", &self.scale.to_f64())?;
        s.serialize_field("values", self.values.as_slice())?;
        s.end()
    }
}

/// Operands keyed by name. Names are unique; iteration is in name order.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OperandBundle<const N: usize = SLOTS> {
    operands: BTreeMap<String, NamedOperand<N>>,
}

impl<const N: usize> Default for OperandBundle<N> {
    fn default() -> Self {
        Self {
            operands: BTreeMap::new(),
        }
    }
}

impl<const N: usize> OperandBundle<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operand: NamedOperand<N>) -> Result<()> {
        if self.operands.contains_key(&operand.name) {
            return Err(PackError::DuplicateOperand(operand.name));
        }
        self.operands.insert(operand.name.clone(), operand);
        Ok(())
    }

    pub fn merge(&mut self, other: OperandBundle<N>) -> Result<()> {
        for (_, operand) in other.operands {
            self.insert(operand)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NamedOperand<N>> {
        self.operands.get(name)
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operands.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedOperand<N>> {
        self.operands.values()
    }
}

/// Scale a correct evaluation must produce at each named stage output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputScaleTable {
    scales: BTreeMap<String, Scale>,
}

impl OutputScaleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: impl Into<String>, scale: Scale) {
        self.scales.insert(stage.into(), scale);
    }

    pub fn get(&self, stage: &str) -> Option<&Scale> {
        self.scales.get(stage)
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scale)> {
        self.scales.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for OutputScaleTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(k, v)| (k, v.to_string())))
    }
}
