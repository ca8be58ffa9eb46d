//! 多步表单的导航状态

use std::collections::BTreeSet;
use std::fmt;

/// 多步表单的导航状态
///
/// 每次处理器调用时新建，调用结束即丢弃。
/// 保证 `current_step < total_steps`，且 `total_steps >= 1`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub current_step: usize,
    pub total_steps: usize,
    pub step_titles: Vec<String>,
    pub completed_steps: BTreeSet<usize>,
    pub can_go_next: bool,
    pub can_go_back: bool,
    pub is_final_step: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            current_step: 0,
            total_steps: 1,
            step_titles: Vec::new(),
            completed_steps: BTreeSet::new(),
            can_go_next: true,
            can_go_back: false,
            is_final_step: false,
        }
    }
}

impl NavigationState {
    /// 前进一步
    ///
    /// 不能前进或已在最后一步时不做任何改变，返回是否前进
    pub fn advance_step(&mut self) -> bool {
        if !self.can_go_next || self.current_step + 1 >= self.total_steps {
            return false;
        }
        self.completed_steps.insert(self.current_step);
        self.current_step += 1;
        self.is_final_step = self.current_step + 1 == self.total_steps;
        true
    }

    /// 后退一步
    pub fn go_back(&mut self) -> bool {
        if !self.can_go_back || self.current_step == 0 {
            return false;
        }
        self.current_step -= 1;
        self.is_final_step = false;
        true
    }

    pub fn is_last_known_step(&self) -> bool {
        self.current_step + 1 >= self.total_steps
    }

    pub fn current_title(&self) -> Option<&str> {
        self.step_titles.get(self.current_step).map(String::as_str)
    }
}

impl fmt::Display for NavigationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}/{}", self.current_step + 1, self.total_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(current: usize, total: usize) -> NavigationState {
        NavigationState {
            current_step: current,
            total_steps: total,
            ..Default::default()
        }
    }

    #[test]
    fn advance_records_previous_step() {
        let mut nav = state(0, 3);
        assert!(nav.advance_step());
        assert_eq!(nav.current_step, 1);
        assert!(nav.completed_steps.contains(&0));
        assert!(!nav.is_final_step);

        assert!(nav.advance_step());
        assert_eq!(nav.current_step, 2);
        assert!(nav.is_final_step);
        assert_eq!(nav.to_string(), "Step 3/3");
    }

    #[test]
    fn advance_is_noop_at_last_step_or_when_blocked() {
        let mut nav = state(2, 3);
        let before = nav.clone();
        assert!(!nav.advance_step());
        assert_eq!(nav, before);

        let mut blocked = state(0, 3);
        blocked.can_go_next = false;
        let before = blocked.clone();
        assert!(!blocked.advance_step());
        assert_eq!(blocked, before);

        let mut single = NavigationState::default();
        assert!(!single.advance_step());
        assert!(single.completed_steps.is_empty());
    }

    #[test]
    fn go_back_requires_permission() {
        let mut nav = state(2, 3);
        assert!(!nav.go_back());
        nav.can_go_back = true;
        nav.is_final_step = true;
        assert!(nav.go_back());
        assert_eq!(nav.current_step, 1);
        assert!(!nav.is_final_step);
    }
}
