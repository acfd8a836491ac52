// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;

const TICK: std::time::Duration = std::time::Duration::from_secs(5);

fn repeater_at(port: u16) -> Arc<RaRepeater> {
    RaRepeater::new(
        RepeaterConfig {
            hostname: "127.0.0.1".to_string(),
            port,
            username: "lutron".to_string(),
            password: "integration".to_string(),
        },
        Watchdog::new(),
    )
}

#[tokio::test]
async fn handle_line_records_output_levels() {
    let repeater = repeater_at(0);
    repeater.cache().watch_output(5);

    repeater.handle_line("~OUTPUT,5,1,75.50").await;
    assert_eq!(repeater.get_output_level(5).await, 75.5);
}

#[tokio::test]
async fn handle_line_strips_prompt_prefixes() {
    let repeater = repeater_at(0);
    repeater.cache().watch_output(5);

    repeater.handle_line("\rGNET> ~OUTPUT,5,1,25.00").await;
    assert_eq!(repeater.get_output_level(5).await, 25.0);

    // A doubled prompt with the post-login NUL variant still decodes.
    repeater.handle_line("GNET> \u{0}GNET> ~OUTPUT,5,1,50.00").await;
    assert_eq!(repeater.get_output_level(5).await, 50.0);
}

#[tokio::test]
async fn handle_line_consumes_bare_prompt() {
    let repeater = repeater_at(0);
    // Nothing recorded, nothing panicking; a prompt-only line is noise.
    repeater.handle_line("\rGNET> ").await;
    repeater.handle_line("GNET> ").await;
}

#[tokio::test]
async fn handle_line_distinguishes_leds_from_buttons() {
    let repeater = repeater_at(0);
    repeater.cache().watch_device(21, &[1], &[81]);

    // An LED action line also matches the button pattern; the LED pattern
    // must win.
    repeater.handle_line("~DEVICE,21,81,9,1").await;
    assert!(repeater.get_led_state(21, 81).await);

    repeater.handle_line("~DEVICE,21,1,3").await;
    assert!(repeater.get_button_state(21, 1).await);
    repeater.handle_line("~DEVICE,21,1,4").await;
    assert!(!repeater.get_button_state(21, 1).await);
}

#[tokio::test]
async fn connect_logs_in_and_enables_monitoring() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"login: ").await.unwrap();
        let mut username = String::new();
        reader.read_line(&mut username).await.unwrap();
        assert_eq!(username.trim_end(), "lutron");

        write_half.write_all(b"password: ").await.unwrap();
        let mut password = String::new();
        reader.read_line(&mut password).await.unwrap();
        assert_eq!(password.trim_end(), "integration");

        write_half.write_all(b"\r\nGNET> ").await.unwrap();

        let mut first_command = String::new();
        reader.read_line(&mut first_command).await.unwrap();
        assert_eq!(first_command.trim_end(), "#MONITORING,255,1");

        // Answer a refresh burst with one output level.
        write_half
            .write_all(b"\rGNET> ~OUTPUT,5,1,75.50\r\n")
            .await
            .unwrap();
        // Hold the socket open until the test finishes.
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    let repeater = repeater_at(port);
    repeater.cache().watch_output(5);
    timeout(TICK, repeater.connect()).await.unwrap().unwrap();

    let level = timeout(TICK, repeater.get_output_level(5)).await.unwrap();
    assert_eq!(level, 75.5);
    server.abort();
}

#[tokio::test]
async fn connect_rejected_login_is_an_auth_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_half.write_all(b"login: ").await.unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        write_half.write_all(b"password: ").await.unwrap();
        line.clear();
        reader.read_line(&mut line).await.unwrap();
        // Wrong credentials: the repeater just re-prompts.
        write_half.write_all(b"bad login\r\nlogin: ").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });

    let repeater = repeater_at(port);
    let result = timeout(TICK, repeater.connect()).await.unwrap();
    assert!(matches!(result, Err(GatewayError::Auth(_))));
    server.abort();
}
