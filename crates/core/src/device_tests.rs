// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn devclass_round_trips_through_str() {
    for class in [DevClass::Control, DevClass::Sensor, DevClass::Output] {
        assert_eq!(class.as_str().parse::<DevClass>().unwrap(), class);
    }
    assert!("keypad".parse::<DevClass>().is_err());
}

#[test]
fn parse_description_splits_type_and_state() {
    let filter = DeviceFilter::parse_description("light:on", Some(DevClass::Output));
    assert_eq!(filter.devclass, Some(DevClass::Output));
    assert_eq!(filter.devtype.as_deref(), Some("light"));
    assert_eq!(filter.devstate.as_deref(), Some("on"));
}

#[test]
fn parse_description_type_only() {
    let filter = DeviceFilter::parse_description("shade", None);
    assert_eq!(filter.devtype.as_deref(), Some("shade"));
    assert_eq!(filter.devstate, None);
}

#[test]
fn parse_description_state_only() {
    // Leading colon means "any type, this state".
    let filter = DeviceFilter::parse_description(":open", None);
    assert_eq!(filter.devtype, None);
    assert_eq!(filter.devstate.as_deref(), Some("open"));
}

#[test]
fn filter_display_lists_populated_fields() {
    let filter = DeviceFilter::new(Some(DevClass::Output), Some("light".into()), None);
    assert_eq!(
        filter.to_string(),
        "(devclass = \"output\", devtype = \"light\")"
    );
    assert_eq!(DeviceFilter::all().to_string(), "(all)");
}

#[test]
fn age_state_parses_seconds() {
    assert_eq!(parse_age_state("age=3600"), Some(3600));
    assert_eq!(parse_age_state("age=0"), Some(0));
    assert_eq!(parse_age_state("age="), None);
    assert_eq!(parse_age_state("on"), None);
    assert_eq!(parse_age_state("age=abc"), None);
}
