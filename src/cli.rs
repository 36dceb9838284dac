use std::io::{self, Write};
use clap::Parser;
use reqwest::{Client, Method, Response};
use serde_json::{json, Value};
use uuid::Uuid;
use classidb::model::{ClassificationLabel, Record};
use classidb::parser::{self, Command, ListArgs};

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about = "Interactive client for a classidb server", long_about = None)]
struct Args {
    #[clap(long, env = "CLASSIDB_ADDR", default_value = "127.0.0.1:3001")]
    host: String,
}

struct Session {
    client: Client,
    base: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    print_banner();

    let session = Session {
        client: Client::new(),
        base: format!("http://{}", args.host),
    };

    match session.send(Method::GET, "/health", None).await {
        Ok(_) => println!("[\u{2713}] Connected to classidb at {}!", args.host),
        Err(_) => {
            println!("[\u{2717}] Could not reach server at {}.", args.host);
            println!("    Start it with 'cargo run --bin classidb' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("classidb> ");
        if io::stdout().flush().is_err() { break; }
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = session.execute(cmd).await {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("LABEL") {
                    println!("    \u{2139}\u{fe0f}  Hint: LABEL <uuid> \"invoice\" 0.9 \"receipt\" 0.1");
                } else if buffer.to_uppercase().starts_with("LIST") {
                    println!("    \u{2139}\u{fe0f}  Hint: LIST TYPE \"inv\" MIN 0.5 SORT confidence DESC LIMIT 10");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   classidb CLI - Document Classification Store");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. LIST:    LIST [TYPE \"x\"] [MIN n] [MAX n] [SORT name|confidence|updated [ASC|DESC]] [PAGE n] [LIMIT n]");
    println!("2. GET:     GET <uuid>");
    println!("3. ADD:     ADD \"document name\" \"label\" 0.9 ...");
    println!("4. RENAME:  RENAME <uuid> \"new name\"");
    println!("5. LABEL:   LABEL <uuid> \"label\" 0.9 ...   (replaces all labels)");
    println!("6. UNDO:    UNDO <uuid>");
    println!("7. HEALTH:  Server counters");
    println!("8. EXIT:    Quit\n");
}

impl Session {
    async fn execute(&self, cmd: Command) -> Result<(), String> {
        match cmd {
            Command::Help => { print_help(); Ok(()) },
            Command::List(args) => self.perform_list(args).await,
            Command::Get { id } => self.perform_get(id).await,
            Command::Add { name, labels } => self.perform_add(name, labels).await,
            Command::Rename { id, name } => {
                self.perform_update(id, json!({ "document_name": name })).await
            },
            Command::Label { id, labels } => {
                self.perform_update(id, json!({ "classifications": labels })).await
            },
            Command::Undo { id } => self.perform_undo(id).await,
            Command::Health => self.perform_health().await,
            Command::Exit => Ok(()),
        }
    }

    // --- NETWORK HANDLERS ---

    async fn perform_list(&self, args: ListArgs) -> Result<(), String> {
        let url = format!("{}/classifications", self.base);
        let resp = self.client.get(url).query(&args.to_query()).send().await.map_err(|e| e.to_string())?;
        let body = read_body(resp).await?;

        let records: Vec<Record> = serde_json::from_value(body["data"].clone()).map_err(|e| e.to_string())?;
        let p = &body["pagination"];
        println!("\nPage {} of {} ({} matching):", p["page"], p["pages"], p["total"]);
        for record in &records {
            print_record_line(record);
        }
        println!();
        Ok(())
    }

    async fn perform_get(&self, id: Uuid) -> Result<(), String> {
        let body = self.send(Method::GET, &format!("/classifications/{id}"), None).await?;
        print_record(&body["data"])
    }

    async fn perform_add(&self, name: String, labels: Vec<ClassificationLabel>) -> Result<(), String> {
        let payload = json!([{ "document_name": name, "classifications": labels }]);
        let body = self.send(Method::POST, "/classifications", Some(payload)).await?;
        let created: Vec<Record> = serde_json::from_value(body["data"].clone()).map_err(|e| e.to_string())?;
        for record in created {
            println!("[\u{2713} OK] Created ID: {}", record.id);
        }
        Ok(())
    }

    async fn perform_update(&self, id: Uuid, patch: Value) -> Result<(), String> {
        let body = self.send(Method::PATCH, &format!("/classifications/{id}"), Some(patch)).await?;
        println!("[\u{2713} OK] {}", body["message"].as_str().unwrap_or("Updated"));
        if body["canUndo"].as_bool() == Some(true) {
            println!("    \u{2139}\u{fe0f}  'UNDO {}' reverts this change for a short while.", id);
        }
        print_record(&body["data"])
    }

    async fn perform_undo(&self, id: Uuid) -> Result<(), String> {
        let body = self.send(Method::POST, &format!("/classifications/{id}/undo"), None).await?;
        println!("[\u{21a9}\u{fe0f} Undo] {}", body["message"].as_str().unwrap_or("Reverted"));
        print_record(&body["data"])
    }

    async fn perform_health(&self) -> Result<(), String> {
        let body = self.send(Method::GET, "/health", None).await?;
        println!("Status:        {}", body["status"].as_str().unwrap_or("unknown"));
        println!("Documents:     {}", body["documents_count"]);
        println!("Pending undos: {}", body["undo_history_count"]);
        Ok(())
    }

    async fn send(&self, method: Method, path: &str, payload: Option<Value>) -> Result<Value, String> {
        let mut req = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(payload) = payload {
            req = req.json(&payload);
        }
        let resp = req.send().await.map_err(|e| e.to_string())?;
        read_body(resp).await
    }
}

async fn read_body(resp: Response) -> Result<Value, String> {
    let status = resp.status();
    let body: Value = resp.json().await.map_err(|e| e.to_string())?;
    if status.is_success() {
        Ok(body)
    } else {
        let message = body["error"].as_str().unwrap_or("request failed");
        Err(format!("{} ({})", message, status.as_u16()))
    }
}

fn print_record_line(record: &Record) {
    let top = record
    .classifications
    .iter()
    .max_by(|a, b| a.score.total_cmp(&b.score))
    .map(|c| format!("{} {:.2}", c.label, c.score))
    .unwrap_or_else(|| "-".to_string());
    let edited = if record.manually_edited { " \u{270e}" } else { "" };
    println!("  \u{2022} {} | {} | {}{}", record.id, record.document_name, top, edited);
}

fn print_record(data: &Value) -> Result<(), String> {
    let record: Record = serde_json::from_value(data.clone()).map_err(|e| e.to_string())?;
    println!("ID:       {}", record.id);
    println!("Document: \"{}\"", record.document_name);
    for c in &record.classifications {
        println!("  - {:<20} {:.4}", c.label, c.score);
    }
    println!("Edited:   {}", record.manually_edited);
    println!("Created:  {}", record.created_at.to_rfc3339());
    println!("Updated:  {}", record.updated_at.to_rfc3339());
    Ok(())
}
