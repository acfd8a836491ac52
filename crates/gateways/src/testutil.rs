// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for gateway tests.

use std::collections::HashMap;
use std::sync::Arc;

use sg_core::FakeClock;
use sg_house::{FakeNotifyAdapter, House, Notifier};
use sg_storage::Persistence;

pub fn test_house() -> (Arc<House>, FakeClock, FakeNotifyAdapter) {
    let clock = FakeClock::new();
    let persist =
        Arc::new(Persistence::open_in_memory(Arc::new(clock.clone())).expect("in-memory db"));
    let adapter = FakeNotifyAdapter::new();
    let notifier = Notifier::new(HashMap::new(), Arc::new(adapter.clone()));
    let house =
        House::new("House", persist, notifier, Arc::new(clock.clone())).expect("house init");
    (house, clock, adapter)
}

pub fn test_house_with_aliases(
    aliases: HashMap<String, Vec<(String, String)>>,
) -> (Arc<House>, FakeClock, FakeNotifyAdapter) {
    let clock = FakeClock::new();
    let persist =
        Arc::new(Persistence::open_in_memory(Arc::new(clock.clone())).expect("in-memory db"));
    let adapter = FakeNotifyAdapter::new();
    let notifier = Notifier::new(aliases, Arc::new(adapter.clone()));
    let house =
        House::new("House", persist, notifier, Arc::new(clock.clone())).expect("house init");
    (house, clock, adapter)
}
