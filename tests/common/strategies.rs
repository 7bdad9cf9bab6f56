//! Proptest strategies for configuration payloads and controller operations.

#![allow(dead_code)]

use buffer_config::models::Configuration;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Arbitrary flat settings documents
pub fn configuration_strategy() -> impl Strategy<Value = Configuration> {
    prop::collection::btree_map("[a-z_]{1,12}", any::<i64>(), 0..8).prop_map(|entries| {
        let object: Map<String, Value> = entries
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect();
        Configuration::from_value(Value::Object(object))
    })
}

/// One step a host or the network can take against the controller
#[derive(Debug, Clone)]
pub enum ControllerOp {
    Start,
    Stop,
    Load,
    Deliver(Configuration),
    Remove,
}

pub fn controller_op_strategy() -> impl Strategy<Value = ControllerOp> {
    prop_oneof![
        1 => Just(ControllerOp::Start),
        1 => Just(ControllerOp::Stop),
        3 => Just(ControllerOp::Load),
        2 => configuration_strategy().prop_map(ControllerOp::Deliver),
        1 => Just(ControllerOp::Remove),
    ]
}
