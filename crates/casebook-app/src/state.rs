// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::model::TableDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub tabs: Vec<TableDescriptor>,
    pub active_tab: usize,
    pub status_line: Option<String>,
    pub quit_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SelectTab(usize),
    SetStatus(String),
    ClearStatus,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    TabChanged(usize),
    StatusUpdated(String),
    StatusCleared,
    QuitRequested,
}

impl AppState {
    pub fn new(tabs: Vec<TableDescriptor>) -> Result<Self> {
        if tabs.is_empty() {
            bail!("no tables configured -- add at least one name to [ui].tables");
        }
        Ok(Self {
            tabs,
            active_tab: 0,
            status_line: None,
            quit_requested: false,
        })
    }

    /// Starts on the tab whose remote name matches `name`.
    pub fn with_active_table(mut self, name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        let Some(index) = self.tabs.iter().position(|tab| tab.remote_name() == wanted) else {
            bail!(
                "table {name:?} is not configured -- choose one of: {}",
                self.tabs
                    .iter()
                    .map(TableDescriptor::remote_name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        };
        self.active_tab = index;
        Ok(self)
    }

    pub fn active(&self) -> Option<&TableDescriptor> {
        self.tabs.get(self.active_tab)
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(index) => {
                if index >= self.tabs.len() || index == self.active_tab {
                    return Vec::new();
                }
                self.active_tab = index;
                vec![AppEvent::TabChanged(index)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
            AppCommand::Quit => {
                self.quit_requested = true;
                vec![AppEvent::QuitRequested]
            }
        }
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        if self.tabs.len() < 2 {
            return Vec::new();
        }
        let len = self.tabs.len() as isize;
        let next = (self.active_tab as isize + delta).rem_euclid(len) as usize;
        self.active_tab = next;
        vec![AppEvent::TabChanged(next)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
