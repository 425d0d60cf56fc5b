use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{
    decode, encode, AuthenticationData, ClientEvent, PlayerCoordinates, ServerEvent, SetupData,
    ShootData, Team, TeamBase,
};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Scripted bot that joins the arena, walks a few steps and fires arrows
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Display name of the bot
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Number of arrows to fire
    #[arg(long, default_value = "3")]
    shots: u32,

    /// Seconds to stay connected
    #[arg(long, default_value = "5")]
    duration: u64,
}

fn sample_bases() -> Vec<TeamBase> {
    vec![
        TeamBase {
            x: 0.0,
            y: 0.0,
            width: 160.0,
            height: 160.0,
            team: Team::Red,
        },
        TeamBase {
            x: 640.0,
            y: 440.0,
            width: 160.0,
            height: 160.0,
            team: Team::Blue,
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (ws_stream, _) = connect_async(args.server.as_str()).await?;
    println!("Connected to {}", args.server);
    let (mut write, mut read) = ws_stream.split();

    let auth = ClientEvent::Authenticate(AuthenticationData {
        name: args.name.clone(),
        character: "dude".to_string(),
    });
    write.send(Message::text(encode(&auth)?)).await?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);

    while Instant::now() < deadline {
        let frame = match timeout(Duration::from_millis(250), read.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => {
                println!("Server closed the connection");
                break;
            }
            Err(_) => continue,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(reason) => {
                println!("Closed by server: {:?}", reason);
                break;
            }
            _ => continue,
        };

        let event: ServerEvent = match decode(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                println!("Undecodable frame ({}): {}", e, text.as_str());
                continue;
            }
        };
        println!("<- {}", event.name());

        match event {
            ServerEvent::SetupRequest => {
                let setup = ClientEvent::Setup(SetupData {
                    bases: sample_bases(),
                });
                write.send(Message::text(encode(&setup)?)).await?;
                println!("-> game:setup");
            }
            ServerEvent::Protagonist(me) => {
                println!(
                    "Joined as {} on team {:?} at ({}, {})",
                    me.id, me.team, me.x, me.y
                );

                for step in 1..=5 {
                    let moved = ClientEvent::Move(PlayerCoordinates {
                        id: me.id.clone(),
                        x: me.x + step as f32 * 4.0,
                        y: me.y,
                        velocity_x: 150.0,
                        velocity_y: 0.0,
                        animation: Some("right".to_string()),
                    });
                    write.send(Message::text(encode(&moved)?)).await?;
                    sleep(Duration::from_millis(50)).await;
                }

                for _ in 0..args.shots {
                    let shot = ClientEvent::Shoot(ShootData {
                        player_id: me.id.clone(),
                        x: me.x,
                        y: me.y,
                        pos_diff_x: 1.0,
                        pos_diff_y: 0.0,
                    });
                    write.send(Message::text(encode(&shot)?)).await?;
                    println!("-> arrow:shoot");
                }
            }
            ServerEvent::Points(points) => println!("   score: {:?}", points),
            ServerEvent::Reconnect | ServerEvent::Stopped => break,
            _ => {}
        }
    }

    write.send(Message::Close(None)).await?;
    println!("Disconnected");
    Ok(())
}
