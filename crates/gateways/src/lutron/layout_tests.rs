// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project>
  <Areas>
    <Area Name="Root Area" IntegrationID="1">
      <Areas>
        <Area Name="Kitchen" IntegrationID="4">
          <Outputs>
            <Output Name="Ceiling" IntegrationID="5" OutputType="INC" />
            <Output Name="Disposal" IntegrationID="6" OutputType="NON_DIM" />
          </Outputs>
          <DeviceGroups>
            <DeviceGroup Name="Kitchen Keypads">
              <Devices>
                <Device Name="Door Keypad" IntegrationID="21" DeviceType="SEETOUCH_KEYPAD">
                  <Components>
                    <Component ComponentNumber="1" ComponentType="BUTTON">
                      <Button Name="Button 1" Engraving="Lights" />
                    </Component>
                    <Component ComponentNumber="2" ComponentType="BUTTON">
                      <Button Name="Button 2" Engraving="" />
                    </Component>
                    <Component ComponentNumber="16" ComponentType="BUTTON">
                      <Button Name="Button 16" Engraving="" />
                    </Component>
                    <Component ComponentNumber="81" ComponentType="LED" />
                  </Components>
                </Device>
              </Devices>
            </DeviceGroup>
          </DeviceGroups>
        </Area>
        <Area Name="Porch" IntegrationID="7">
          <Outputs>
            <Output Name="Shade" IntegrationID="8" OutputType="SYSTEM_SHADE" />
          </Outputs>
          <DeviceGroups>
            <DeviceGroup Name="Remotes">
              <Devices>
                <Device Name="Pico" IntegrationID="30" DeviceType="PICO_KEYPAD">
                  <Components>
                    <Component ComponentNumber="2" ComponentType="BUTTON">
                      <Button Name="Button 2" Engraving="" />
                    </Component>
                    <Component ComponentNumber="4" ComponentType="BUTTON">
                      <Button Name="Button 4" Engraving="" />
                    </Component>
                  </Components>
                </Device>
              </Devices>
            </DeviceGroup>
          </DeviceGroups>
        </Area>
      </Areas>
    </Area>
  </Areas>
</Project>
"#;

#[test]
fn root_area_is_skipped_and_leaf_areas_kept() {
    let layout = Layout::from_xml(SAMPLE_XML, &[]).unwrap();
    let names: Vec<&str> = layout.areas().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["Kitchen", "Porch"]);
}

#[test]
fn outputs_carry_type_and_iid() {
    let layout = Layout::from_xml(SAMPLE_XML, &[]).unwrap();
    let kitchen = &layout.areas()[0];
    assert_eq!(kitchen.outputs.len(), 2);
    assert_eq!(kitchen.outputs[0].iid, 5);
    assert_eq!(kitchen.outputs[0].output_type, "INC");
    assert_eq!(kitchen.outputs[1].output_type, "NON_DIM");
    assert_eq!(layout.output_count(), 3);
}

#[test]
fn button_labels_prefer_engraving_then_fixed_names_then_name() {
    let layout = Layout::from_xml(SAMPLE_XML, &[]).unwrap();
    let keypad = &layout.areas()[0].devices[0];
    assert_eq!(keypad.device_type, "SEETOUCH_KEYPAD");
    assert_eq!(keypad.buttons[&1], "Lights", "engraving wins");
    assert_eq!(keypad.buttons[&2], "Button 2", "empty engraving falls to name");
    assert_eq!(keypad.buttons[&16], "Lower", "well-known fixed button");

    let pico = &layout.areas()[1].devices[0];
    assert_eq!(pico.buttons[&2], "Top");
    assert_eq!(pico.buttons[&4], "Bottom");
}

#[test]
fn led_pairing_is_button_id_plus_eighty() {
    let layout = Layout::from_xml(SAMPLE_XML, &[]).unwrap();
    let keypad = &layout.areas()[0].devices[0];
    assert!(keypad.leds.contains(&81));
    assert_eq!(keypad.led_for_button(1), Some(81));
    assert_eq!(keypad.led_for_button(2), None, "no LED 82 in the layout");
}

#[test]
fn ignored_keypads_lose_buttons_and_leds() {
    let layout = Layout::from_xml(SAMPLE_XML, &[21]).unwrap();
    let keypad = &layout.areas()[0].devices[0];
    assert!(keypad.buttons.is_empty());
    assert!(keypad.leds.is_empty());
    // The device itself is still listed.
    assert_eq!(keypad.iid, 21);
}

#[test]
fn garbage_xml_is_a_layout_error() {
    let result = Layout::from_xml("<not-even-close", &[]);
    assert!(matches!(result, Err(GatewayError::Layout(_))));
}
