//! Foreign-key relationships and what happens to dependants on delete.
//!
//! The schema in `migrations/` is the enforcing copy; the tests below keep the
//! two in step.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Dependant rows are removed with their parent.
    Cascade,
    /// The referencing column is cleared and the row survives.
    SetNull,
}

impl DeletePolicy {
    pub const fn as_sql(self) -> &'static str {
        match self {
            DeletePolicy::Cascade => "ON DELETE CASCADE",
            DeletePolicy::SetNull => "ON DELETE SET NULL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub table: &'static str,
    pub column: &'static str,
    pub references: &'static str,
    pub nullable: bool,
    pub on_delete: DeletePolicy,
}

impl Relation {
    /// Name Postgres gives the constraint when the schema leaves it unnamed.
    pub fn constraint_name(&self) -> String {
        format!("{}_{}_fkey", self.table, self.column)
    }
}

pub const POST_AUTHOR: Relation = Relation {
    table: "posts",
    column: "author_id",
    references: "users",
    nullable: false,
    on_delete: DeletePolicy::Cascade,
};

pub const POST_GROUP: Relation = Relation {
    table: "posts",
    column: "group_id",
    references: "groups",
    nullable: true,
    on_delete: DeletePolicy::SetNull,
};

pub const COMMENT_POST: Relation = Relation {
    table: "comments",
    column: "post_id",
    references: "posts",
    nullable: true,
    on_delete: DeletePolicy::Cascade,
};

pub const COMMENT_AUTHOR: Relation = Relation {
    table: "comments",
    column: "author_id",
    references: "users",
    nullable: true,
    on_delete: DeletePolicy::Cascade,
};

pub const FOLLOW_USER: Relation = Relation {
    table: "follows",
    column: "user_id",
    references: "users",
    nullable: false,
    on_delete: DeletePolicy::Cascade,
};

pub const FOLLOW_AUTHOR: Relation = Relation {
    table: "follows",
    column: "author_id",
    references: "users",
    nullable: false,
    on_delete: DeletePolicy::Cascade,
};

pub const SESSION_USER: Relation = Relation {
    table: "sessions",
    column: "user_id",
    references: "users",
    nullable: false,
    on_delete: DeletePolicy::Cascade,
};

pub const ALL: [Relation; 7] = [
    POST_AUTHOR,
    POST_GROUP,
    COMMENT_POST,
    COMMENT_AUTHOR,
    FOLLOW_USER,
    FOLLOW_AUTHOR,
    SESSION_USER,
];

pub fn by_constraint(name: &str) -> Option<&'static Relation> {
    let all: &'static [Relation] = &ALL;
    all.iter().find(|relation| relation.constraint_name() == name)
}

/// Relations whose rows disappear when a row of `table` is deleted.
pub fn cascading_from(table: &str) -> impl Iterator<Item = &'static Relation> + '_ {
    let all: &'static [Relation] = &ALL;
    all.iter()
        .filter(move |relation| relation.references == table)
        .filter(|relation| relation.on_delete == DeletePolicy::Cascade)
}
