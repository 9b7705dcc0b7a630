//! Static schema declaration for the blog data set.
//!
//! Table and column names mirror `store/migrations/0001_init.sql`; the store
//! readiness check verifies both agree before any query runs.

use super::entity::{
    Cardinality, Col, Entity, EntityDef, FieldDef, FieldType, Relationship, SoftDelete,
};

const DELETED_AT: &str = "deleted_at";

static USER_DEF: EntityDef = EntityDef {
    entity: Entity::User,
    table: "users",
    primary_key: "id",
    fields: &[
        FieldDef::required("id", FieldType::Integer),
        FieldDef::required("name", FieldType::Text),
        FieldDef::required("username", FieldType::Text),
        FieldDef::required("email", FieldType::Text),
        FieldDef::required("phone", FieldType::Text),
        FieldDef::required("website", FieldType::Text),
        FieldDef::nullable(DELETED_AT, FieldType::Timestamp),
    ],
    relationships: &[
        Relationship {
            name: "address",
            from: Entity::User,
            to: Entity::Address,
            cardinality: Cardinality::OneToOne,
            from_key: "id",
            to_key: "user_id",
        },
        Relationship {
            name: "company",
            from: Entity::User,
            to: Entity::Company,
            cardinality: Cardinality::OneToOne,
            from_key: "id",
            to_key: "user_id",
        },
        Relationship {
            name: "posts",
            from: Entity::User,
            to: Entity::Post,
            cardinality: Cardinality::OneToMany,
            from_key: "id",
            to_key: "user_id",
        },
    ],
    soft_delete: Some(SoftDelete { marker: DELETED_AT }),
};

static ADDRESS_DEF: EntityDef = EntityDef {
    entity: Entity::Address,
    table: "user_addresses",
    primary_key: "id",
    fields: &[
        FieldDef::required("id", FieldType::Integer),
        FieldDef::required("user_id", FieldType::Integer),
        FieldDef::required("street", FieldType::Text),
        FieldDef::required("suite", FieldType::Text),
        FieldDef::required("city", FieldType::Text),
        FieldDef::required("zipcode", FieldType::Text),
        FieldDef::required("lat", FieldType::Text),
        FieldDef::required("lng", FieldType::Text),
    ],
    relationships: &[Relationship {
        name: "user",
        from: Entity::Address,
        to: Entity::User,
        cardinality: Cardinality::ManyToOne,
        from_key: "user_id",
        to_key: "id",
    }],
    soft_delete: None,
};

static COMPANY_DEF: EntityDef = EntityDef {
    entity: Entity::Company,
    table: "user_companies",
    primary_key: "id",
    fields: &[
        FieldDef::required("id", FieldType::Integer),
        FieldDef::required("user_id", FieldType::Integer),
        FieldDef::required("name", FieldType::Text),
        FieldDef::required("catch_phrase", FieldType::Text),
        FieldDef::required("bs", FieldType::Text),
    ],
    relationships: &[Relationship {
        name: "user",
        from: Entity::Company,
        to: Entity::User,
        cardinality: Cardinality::ManyToOne,
        from_key: "user_id",
        to_key: "id",
    }],
    soft_delete: None,
};

static POST_DEF: EntityDef = EntityDef {
    entity: Entity::Post,
    table: "posts",
    primary_key: "id",
    fields: &[
        FieldDef::required("id", FieldType::Integer),
        FieldDef::required("user_id", FieldType::Integer),
        FieldDef::required("title", FieldType::Text),
        FieldDef::required("body", FieldType::Text),
        FieldDef::nullable(DELETED_AT, FieldType::Timestamp),
    ],
    relationships: &[
        Relationship {
            name: "author",
            from: Entity::Post,
            to: Entity::User,
            cardinality: Cardinality::ManyToOne,
            from_key: "user_id",
            to_key: "id",
        },
        Relationship {
            name: "comments",
            from: Entity::Post,
            to: Entity::Comment,
            cardinality: Cardinality::OneToMany,
            from_key: "id",
            to_key: "post_id",
        },
    ],
    soft_delete: Some(SoftDelete { marker: DELETED_AT }),
};

static COMMENT_DEF: EntityDef = EntityDef {
    entity: Entity::Comment,
    table: "comments",
    primary_key: "id",
    fields: &[
        FieldDef::required("id", FieldType::Integer),
        FieldDef::required("post_id", FieldType::Integer),
        FieldDef::required("name", FieldType::Text),
        FieldDef::required("email", FieldType::Text),
        FieldDef::required("body", FieldType::Text),
        FieldDef::nullable(DELETED_AT, FieldType::Timestamp),
    ],
    relationships: &[Relationship {
        name: "post",
        from: Entity::Comment,
        to: Entity::Post,
        cardinality: Cardinality::ManyToOne,
        from_key: "post_id",
        to_key: "id",
    }],
    soft_delete: Some(SoftDelete { marker: DELETED_AT }),
};

pub(crate) fn entity_def(entity: Entity) -> &'static EntityDef {
    match entity {
        Entity::User => &USER_DEF,
        Entity::Address => &ADDRESS_DEF,
        Entity::Company => &COMPANY_DEF,
        Entity::Post => &POST_DEF,
        Entity::Comment => &COMMENT_DEF,
    }
}

pub mod users {
    use super::{Col, Entity};

    pub const ID: Col = Col::new(Entity::User, "id");
    pub const NAME: Col = Col::new(Entity::User, "name");
    pub const USERNAME: Col = Col::new(Entity::User, "username");
    pub const EMAIL: Col = Col::new(Entity::User, "email");
    pub const PHONE: Col = Col::new(Entity::User, "phone");
    pub const WEBSITE: Col = Col::new(Entity::User, "website");
    pub const DELETED_AT: Col = Col::new(Entity::User, "deleted_at");
}

pub mod addresses {
    use super::{Col, Entity};

    pub const ID: Col = Col::new(Entity::Address, "id");
    pub const USER_ID: Col = Col::new(Entity::Address, "user_id");
    pub const STREET: Col = Col::new(Entity::Address, "street");
    pub const SUITE: Col = Col::new(Entity::Address, "suite");
    pub const CITY: Col = Col::new(Entity::Address, "city");
    pub const ZIPCODE: Col = Col::new(Entity::Address, "zipcode");
    pub const LAT: Col = Col::new(Entity::Address, "lat");
    pub const LNG: Col = Col::new(Entity::Address, "lng");
}

pub mod companies {
    use super::{Col, Entity};

    pub const ID: Col = Col::new(Entity::Company, "id");
    pub const USER_ID: Col = Col::new(Entity::Company, "user_id");
    pub const NAME: Col = Col::new(Entity::Company, "name");
    pub const CATCH_PHRASE: Col = Col::new(Entity::Company, "catch_phrase");
    pub const BS: Col = Col::new(Entity::Company, "bs");
}

pub mod posts {
    use super::{Col, Entity};

    pub const ID: Col = Col::new(Entity::Post, "id");
    pub const USER_ID: Col = Col::new(Entity::Post, "user_id");
    pub const TITLE: Col = Col::new(Entity::Post, "title");
    pub const BODY: Col = Col::new(Entity::Post, "body");
    pub const DELETED_AT: Col = Col::new(Entity::Post, "deleted_at");
}

pub mod comments {
    use super::{Col, Entity};

    pub const ID: Col = Col::new(Entity::Comment, "id");
    pub const POST_ID: Col = Col::new(Entity::Comment, "post_id");
    pub const NAME: Col = Col::new(Entity::Comment, "name");
    pub const EMAIL: Col = Col::new(Entity::Comment, "email");
    pub const BODY: Col = Col::new(Entity::Comment, "body");
    pub const DELETED_AT: Col = Col::new(Entity::Comment, "deleted_at");
}
