//! Project command handlers

use anyhow::{bail, Context, Result};

use bitdesk_core::{ProjectId, ProjectStore, ProjectUpdate};

use crate::output::Output;

/// List all projects
pub async fn list<S: ProjectStore>(store: &S, output: &Output) -> Result<()> {
    let projects = store.list().await.context("Failed to list projects")?;
    output.print_projects(&projects);
    Ok(())
}

/// Create a new, empty project
pub async fn create<S: ProjectStore>(
    store: &S,
    name: Option<String>,
    output: &Output,
) -> Result<()> {
    let project = store
        .create(name)
        .await
        .context("Failed to create project")?;

    if output.is_quiet() {
        println!("{}", project.id);
    } else {
        output.success(&format!("Created project: {}", project.name));
        output.print_project(&project);
    }

    Ok(())
}

/// Show project details
pub async fn show<S: ProjectStore>(store: &S, id: String, output: &Output) -> Result<()> {
    let id = ProjectId::parse(&id)?;
    let project = store
        .get(&id)
        .await
        .context("Failed to load project")?
        .with_context(|| format!("Project not found: {}", id))?;

    output.print_project(&project);
    Ok(())
}

/// Rename an existing project
pub async fn rename<S: ProjectStore>(
    store: &S,
    id: String,
    name: String,
    output: &Output,
) -> Result<()> {
    let id = ProjectId::parse(&id)?;
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("Project name cannot be empty");
    }

    // upsert would create a missing project; renaming should not
    if store.get(&id).await?.is_none() {
        bail!("Project not found: {}", id);
    }

    let project = store
        .upsert(&id, ProjectUpdate::name(name))
        .await
        .context("Failed to rename project")?;

    output.success(&format!("Renamed project to: {}", project.name));
    Ok(())
}

/// Delete a project
pub async fn delete<S: ProjectStore>(store: &S, id: String, output: &Output) -> Result<()> {
    let id = ProjectId::parse(&id)?;
    store
        .delete(&id)
        .await
        .context("Failed to delete project")?;

    output.success(&format!("Deleted project: {}", id));
    Ok(())
}
