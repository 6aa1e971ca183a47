//! Shared helpers for behavioral specifications.
//!
//! Builds disposable workspaces with the canonical layout and wires an
//! engine runtime against them.

#![allow(dead_code)]

use ac_core::{AgentId, ProjectId, RunId, SessionRef, SystemClock, TeamId};
use ac_engine::{EngineRuntime, LaunchGates, LaunchSpec};
use ac_storage::{init_workspace, WorkspacePaths};
use std::path::Path;

pub struct SpecWorkspace {
    _dir: tempfile::TempDir,
    pub paths: WorkspacePaths,
    pub runtime: EngineRuntime<SystemClock>,
}

/// A workspace named after the company, with one engine runtime attached.
pub fn workspace(company: &str) -> SpecWorkspace {
    let dir = tempfile::tempdir().unwrap();
    let paths = init_workspace(dir.path(), company).unwrap();
    SpecWorkspace {
        _dir: dir,
        paths,
        runtime: EngineRuntime::new(),
    }
}

impl SpecWorkspace {
    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn add_team(&self, team: &str) -> TeamId {
        let team_id = TeamId::new(team);
        let dir = self.root().join("org/teams").join(team);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("team.yaml"), format!("id: {team}\nname: {team}\n")).unwrap();
        team_id
    }

    pub fn add_worker(&self, agent: &str, team: Option<&str>, provider: &str) -> AgentId {
        let agent_id = AgentId::new(agent);
        let dir = self.root().join("org/agents").join(agent);
        std::fs::create_dir_all(&dir).unwrap();
        let mut yaml = format!("role: worker\nprovider: {provider}\n");
        if let Some(team) = team {
            yaml.push_str(&format!("team_id: {team}\n"));
        }
        std::fs::write(dir.join("agent.yaml"), yaml).unwrap();
        std::fs::write(dir.join("AGENTS.md"), format!("# {agent}\n")).unwrap();
        std::fs::write(dir.join("role.md"), "worker\n").unwrap();
        agent_id
    }

    pub fn add_project(&self, project: &str) -> ProjectId {
        let project_id = ProjectId::new(project);
        std::fs::create_dir_all(self.paths.project_dir(&project_id)).unwrap();
        std::fs::write(
            self.paths.project_yaml(&project_id),
            format!("id: {project}\nname: {project}\n"),
        )
        .unwrap();
        std::fs::write(self.paths.project_memory(&project_id), "# Memory\n").unwrap();
        project_id
    }

    /// A plain launch spec for a shell command run.
    pub fn launch_spec(
        &self,
        project: &ProjectId,
        run: &str,
        agent: &AgentId,
        argv: &[&str],
    ) -> LaunchSpec {
        LaunchSpec {
            workspace_dir: self.root().to_path_buf(),
            project_id: project.clone(),
            run_id: RunId::new(run),
            provider: "cmd".to_string(),
            agent_id: agent.clone(),
            argv: argv.iter().map(|s| s.to_string()).collect(),
            stdin_text: None,
            env: Vec::new(),
            session_ref: None,
            actor: None,
            gates: LaunchGates::default(),
        }
    }

    pub fn events_of(&self, project: &ProjectId, run: &str) -> Vec<ac_core::EventEnvelope> {
        ac_storage::read_envelopes(&self.paths.events_path(project, &RunId::new(run)))
    }

    pub fn run_record(&self, project: &ProjectId, run: &str) -> ac_core::RunRecord {
        let text =
            std::fs::read_to_string(self.paths.run_yaml(project, &RunId::new(run))).unwrap();
        serde_yaml::from_str(&text).unwrap()
    }

    pub fn session_ref(&self, run: &str) -> SessionRef {
        SessionRef::local(&RunId::new(run))
    }
}
