//! Line-oriented play loop.
//!
//! - Plain lines are the player's actions
//! - Lines starting with `#` are commands (story, image, quit, help)

use story_core::{ImageId, Role, StoryResult, StorySegment, StorySession};
use tokio::io::{self, AsyncBufReadExt, BufReader};

pub async fn run(session: StorySession, resuming: bool) -> StoryResult<()> {
    println!("=== Storyteller ===");
    print_commands();
    println!();

    if resuming {
        for segment in session.story().await? {
            print_segment(&segment);
        }
    } else {
        let storyline = session.start().await?;
        if let Some(opening) = storyline.last() {
            print_segment(opening);
        }
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            let parts: Vec<&str> = command.split_whitespace().collect();
            match parts.first().copied() {
                Some("quit") | Some("exit") => {
                    println!("Farewell!");
                    break;
                }
                Some("story") => {
                    for segment in session.story().await? {
                        print_segment(&segment);
                    }
                }
                Some("image") => match parts.get(1).map(|s| s.parse::<ImageId>()) {
                    Some(Ok(id)) => {
                        if session.image_ready(id).await {
                            println!("[IMAGE] {}", session.assets().path_for(id).display());
                        } else {
                            println!("[IMAGE] {id} is not ready yet");
                        }
                    }
                    Some(Err(e)) => println!("[ERROR] Invalid image id: {e}"),
                    None => println!("[ERROR] Usage: #image <id>"),
                },
                Some("help") => print_commands(),
                _ => println!("[ERROR] Unknown command. Type #help for commands."),
            }
            continue;
        }

        match session.send(line).await {
            Ok(reply) => print_segment(&reply),
            Err(e) => println!("[ERROR] {e}"),
        }
    }

    Ok(())
}

fn print_commands() {
    println!("Commands:");
    println!("  #story       - Show the whole story so far");
    println!("  #image <id>  - Check whether a character portrait is ready");
    println!("  #quit        - Exit");
    println!("  #help        - Show this help");
}

fn print_segment(segment: &StorySegment) {
    match segment.role {
        Role::Developer => return,
        Role::User => println!("> {}", segment.content),
        Role::Assistant => println!("{}", segment.content),
    }
    if let Some(meta) = &segment.meta {
        if let (Some(id), Some(description)) = (meta.image_id, &meta.character_description) {
            println!("[PORTRAIT {id}] {description}");
        }
    }
    println!();
}
