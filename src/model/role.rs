use strum_macros::{AsRefStr, Display};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, AsRefStr)]
pub enum Role {
    Director = 1,
    Manager = 2,
    DepartmentHead = 3,
    Employee = 4,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Director),
            2 => Some(Role::Manager),
            3 => Some(Role::DepartmentHead),
            4 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Roles allowed to review leave, browse other employees' attendance
    /// and subscribe to the live event feed.
    pub fn is_supervisory(self) -> bool {
        matches!(self, Role::Director | Role::Manager | Role::DepartmentHead)
    }
}
