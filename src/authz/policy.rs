use std::fmt;

use super::{ResourceType, Role};

const ANY: &[Role] = &[];
const ADMIN: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Teacher];

/// Every operation the API exposes, with its declared access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    UserList,
    UserCreate,
    UserRead,
    UserUpdate,
    UserDelete,
    ClassList,
    ClassCreate,
    ClassRead,
    ClassUpdate,
    ClassDelete,
    StudentList,
    StudentCreate,
    StudentRead,
    StudentUpdate,
    StudentDelete,
    TeacherList,
    TeacherCreate,
    TeacherRead,
    TeacherUpdate,
    TeacherDelete,
    ActivityList,
}

impl Operation {
    /// Roles admitted by the gate. Empty means any authenticated principal.
    pub const fn allowed_roles(self) -> &'static [Role] {
        use Operation::*;
        match self {
            UserList | UserCreate | UserDelete => ADMIN,
            UserRead | UserUpdate => ANY,
            ClassList | ClassRead => STAFF,
            ClassCreate | ClassUpdate | ClassDelete => ADMIN,
            StudentList => STAFF,
            StudentCreate | StudentUpdate | StudentDelete => ADMIN,
            StudentRead => ANY,
            TeacherList | TeacherCreate | TeacherDelete => ADMIN,
            TeacherRead => ANY,
            TeacherUpdate => STAFF,
            ActivityList => ADMIN,
        }
    }

    /// The resource type checked by the ownership policy, for operations
    /// that act on one specific record on behalf of its owner or guardian.
    pub const fn ownership_scope(self) -> Option<ResourceType> {
        use Operation::*;
        match self {
            UserRead | UserUpdate => Some(ResourceType::User),
            StudentRead => Some(ResourceType::Student),
            TeacherRead | TeacherUpdate => Some(ResourceType::Teacher),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        use Operation::*;
        match self {
            UserList => "user.list",
            UserCreate => "user.create",
            UserRead => "user.read",
            UserUpdate => "user.update",
            UserDelete => "user.delete",
            ClassList => "class.list",
            ClassCreate => "class.create",
            ClassRead => "class.read",
            ClassUpdate => "class.update",
            ClassDelete => "class.delete",
            StudentList => "student.list",
            StudentCreate => "student.create",
            StudentRead => "student.read",
            StudentUpdate => "student.update",
            StudentDelete => "student.delete",
            TeacherList => "teacher.list",
            TeacherCreate => "teacher.create",
            TeacherRead => "teacher.read",
            TeacherUpdate => "teacher.update",
            TeacherDelete => "teacher.delete",
            ActivityList => "activity.list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
