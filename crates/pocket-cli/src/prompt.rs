//! Terminal dialog presenter
//!
//! Subscribes to the dialog broker and answers requests on stdin/stdout.
//! Without a TTY every request is dismissed.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use pocket_core::dialog::Subscription;
use pocket_core::{DialogBroker, DialogKind, DialogRequest, DialogResponse};
use tracing::{debug, warn};

/// Start answering dialogs from `broker` on the terminal
///
/// Keep the returned subscription alive for as long as dialogs should be
/// shown.
pub fn spawn_presenter(broker: &DialogBroker) -> Subscription {
    let (subscription, mut requests) = broker.subscribe_channel();
    let responder = broker.clone();

    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let id = request.id;
            let response = tokio::task::spawn_blocking(move || render(&request))
                .await
                .unwrap_or_else(|e| {
                    warn!("Dialog presenter failed: {}", e);
                    Ok(DialogResponse::Dismissed)
                })
                .unwrap_or_else(|e| {
                    warn!("Failed to read dialog input: {}", e);
                    DialogResponse::Dismissed
                });

            debug!(%id, "Dialog answered");
            responder.respond(id, response);
        }
    });

    subscription
}

/// Render one request and read the answer
fn render(request: &DialogRequest) -> Result<DialogResponse> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(DialogResponse::Dismissed);
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let options = &request.options;

    if let Some(ref title) = options.title {
        println!("{}", title);
    }

    match request.kind {
        DialogKind::Confirm => {
            let message = options.message.as_deref().unwrap_or("Are you sure?");
            let answer = read_line(&mut input, &format!("{} [y/N] ", message))?;
            let answer = answer.trim().to_lowercase();
            Ok(DialogResponse::Confirmed {
                accepted: answer == "y" || answer == "yes",
            })
        }
        DialogKind::Prompt => {
            let message = options.message.as_deref().unwrap_or("Value");
            let prompt = match options.default_value {
                Some(ref default) => format!("{} [{}]: ", message, default),
                None => format!("{}: ", message),
            };
            let answer = read_line(&mut input, &prompt)?;
            let answer = answer.trim_end_matches(['\r', '\n']);

            if answer.is_empty() {
                return Ok(match options.default_value {
                    Some(ref default) => DialogResponse::Text {
                        value: default.clone(),
                    },
                    None => DialogResponse::Dismissed,
                });
            }
            Ok(DialogResponse::Text {
                value: answer.to_string(),
            })
        }
        DialogKind::Auth => {
            if let Some(ref message) = options.message {
                println!("{}", message);
            }
            let username = match options.username {
                Some(ref name) => name.clone(),
                None => read_line(&mut input, "Username: ")?.trim().to_string(),
            };
            let password = read_line(&mut input, "Password: ")?;
            Ok(DialogResponse::Credentials {
                username,
                password: password.trim_end_matches(['\r', '\n']).to_string(),
            })
        }
    }
}

fn read_line(input: &mut impl BufRead, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}
