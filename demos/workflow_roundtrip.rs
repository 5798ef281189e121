use agent_flow::{
    FileStore, StoreConfig, ToolCatalog, ToolCategory, Workspace, workflow::WorkflowConfig,
};
use anyhow::Result;
use chrono::Utc;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_file(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let dir = tempfile::tempdir()?;
    let config = StoreConfig::default()
        .storage_dir(dir.path())
        .compress(true);
    let mut workspace = Workspace::open(FileStore::from_config(&config), config).await;

    let catalog = ToolCatalog::global();
    for tool in catalog.by_category(ToolCategory::File) {
        println!("{:<6} {}", tool.id, tool.description);
    }

    let diagnostics = workspace.edit(|editor| editor.load_workflow(&WorkflowConfig::example()));
    for diagnostic in &diagnostics {
        println!("dropped: {diagnostic}");
    }

    workspace.edit(|editor| {
        editor.set_user_input("Summarise the Q3 sales figures");
        let agent = editor.add_agent();
        editor.connect("ReportGenerationAgent", &agent)
    })?;

    let topology = workspace.editor().topology()?;
    println!("{}", topology.export_dot());
    for path in topology.find_execution_paths() {
        println!("path: {}", path.join(" -> "));
    }

    let report = workspace.run().await?;
    println!("{}", report.final_output);

    let file = workspace.editor().export_file(Utc::now())?;
    println!("{}:\n{}", file.file_name, file.contents);

    workspace.close().await;
    Ok(())
}
