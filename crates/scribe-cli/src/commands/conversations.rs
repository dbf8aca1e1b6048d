use chrono::SecondsFormat;
use scribe_application::{ChatService, FileExportSink};
use scribe_core::conversation::{ConversationRepository, MessageRole, render_transcript};
use scribe_core::error::{Result, ScribeError};
use scribe_infrastructure::AsyncDirConversationRepository;
use std::path::PathBuf;

pub async fn list(repository: &AsyncDirConversationRepository) -> Result<()> {
    let entries = repository.list().await?;
    if entries.is_empty() {
        println!("No conversations.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}\t{}\t{}/{}\t{}",
            entry.id,
            entry.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            entry.provider,
            entry.model,
            entry.title
        );
    }
    Ok(())
}

pub async fn show(repository: &AsyncDirConversationRepository, id: &str, json: bool) -> Result<()> {
    let conversation = repository
        .load(id)
        .await?
        .ok_or_else(|| ScribeError::not_found("conversation", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversation)?);
    } else {
        println!("{}", render_transcript(&conversation));
    }
    Ok(())
}

pub async fn export(service: &ChatService, id: &str, out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(dir) if dir.is_dir() => {
            let name = service.export(id, &FileExportSink::new(&dir)).await?;
            println!("{}", dir.join(name).display());
        }
        Some(path) => {
            let text = service
                .repository()
                .export_as_text(id)
                .await?
                .ok_or_else(|| ScribeError::not_found("conversation", id))?;
            tokio::fs::write(&path, text).await?;
            println!("{}", path.display());
        }
        None => {
            let text = service
                .repository()
                .export_as_text(id)
                .await?
                .ok_or_else(|| ScribeError::not_found("conversation", id))?;
            print!("{text}");
        }
    }
    Ok(())
}

pub async fn delete(repository: &AsyncDirConversationRepository, id: &str) -> Result<()> {
    repository.delete(id).await?;
    println!("Deleted {id}");
    Ok(())
}

pub async fn migrate(repository: &AsyncDirConversationRepository) -> Result<()> {
    let report = repository.migrate().await?;
    if !report.performed() {
        println!("Nothing to migrate.");
        return Ok(());
    }

    match &report.from_version {
        Some(from) => println!(
            "Migrated index from schema {from}: {} conversation(s)",
            report.migrated
        ),
        None => println!("Index was unreadable and has been reset."),
    }
    for id in &report.failed {
        println!("  failed: {id}");
    }
    if let Some(backup) = &report.backup {
        println!("Backup: {}", backup.display());
    }
    Ok(())
}

pub async fn new(
    service: &ChatService,
    provider: &str,
    model: &str,
    title: Option<&str>,
) -> Result<()> {
    let mut conversation = service.new_chat(provider, model).await?;
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        conversation = service.rename(&conversation.id, title).await?;
    }
    println!("{}\t{}", conversation.id, conversation.title);
    Ok(())
}

pub async fn append(service: &ChatService, id: &str, role: MessageRole, text: &str) -> Result<()> {
    let conversation = service.append_message(id, role, text).await?;
    println!("{}\t{} message(s)", conversation.id, conversation.messages.len());
    Ok(())
}
