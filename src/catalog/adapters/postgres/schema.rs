//! Diesel schema for catalog, binding, credential, and outbox persistence.

diesel::table! {
    /// Shared upstream catalog definitions.
    catalogs (id) {
        /// Catalog identifier.
        id -> Uuid,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Catalog kind (`remote`, `local`).
        #[max_length = 50]
        kind -> Varchar,
        /// Upstream transport (`streamable_http`, `sse`).
        #[max_length = 50]
        transport -> Varchar,
        /// Upstream base URL, absent for local catalogs.
        base_url -> Nullable<Text>,
        /// Auth mode (`none`, `oauth`, `api_key`).
        #[max_length = 50]
        auth_mode -> Varchar,
        /// Declared credential key names as a JSON array.
        credential_keys -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Tools owned by a catalog, unique on `(catalog_id, name)`.
    catalog_tools (id) {
        /// Tool identifier.
        id -> Uuid,
        /// Owning catalog.
        catalog_id -> Uuid,
        /// Tool name.
        #[max_length = 255]
        name -> Varchar,
        /// Normalized description.
        description -> Nullable<Text>,
        /// Input schema as served upstream.
        input_schema -> Jsonb,
        /// SHA-256 content fingerprint.
        #[max_length = 64]
        fingerprint -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Tenant-owned composite entities.
    composite_entities (id) {
        /// Entity identifier.
        id -> Uuid,
        /// Owning tenant.
        #[max_length = 255]
        tenant_id -> Varchar,
        /// Display name.
        #[max_length = 255]
        name -> Varchar,
        /// Creating user.
        #[max_length = 255]
        created_by -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Catalog bindings inside composite entities.
    bindings (id) {
        /// Binding identifier.
        id -> Uuid,
        /// Owning entity.
        entity_id -> Uuid,
        /// Owning tenant.
        #[max_length = 255]
        tenant_id -> Varchar,
        /// Bound catalog.
        catalog_id -> Uuid,
        /// Display name.
        #[max_length = 255]
        display_name -> Varchar,
        /// Enabled flag.
        enabled -> Bool,
        /// Display order inside the entity.
        position -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Allow-list join between bindings and catalog tools.
    binding_tools (binding_id, tool_id) {
        /// Binding.
        binding_id -> Uuid,
        /// Allow-listed tool; rows cascade away when the tool is deleted.
        tool_id -> Uuid,
    }
}

diesel::table! {
    /// Sealed credential bundles scoped to binding, tenant, and user.
    credential_bundles (id) {
        /// Row identifier.
        id -> Uuid,
        /// Owning binding.
        binding_id -> Uuid,
        /// Owning tenant.
        #[max_length = 255]
        tenant_id -> Varchar,
        /// Owning user, null for tenant-wide rows.
        #[max_length = 255]
        user_id -> Nullable<Varchar>,
        /// AES-256-GCM ciphertext prefixed with its nonce.
        sealed -> Bytea,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// OAuth access tokens issued by the external authorization flow.
    oauth_tokens (binding_id, tenant_id, user_id) {
        /// Binding the token grants access for.
        binding_id -> Uuid,
        /// Tenant.
        #[max_length = 255]
        tenant_id -> Varchar,
        /// User.
        #[max_length = 255]
        user_id -> Varchar,
        /// Raw access token.
        access_token -> Text,
        /// Issue timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Notifications awaiting delivery.
    notification_outbox (id) {
        /// Entry identifier.
        id -> Uuid,
        /// Recipient tenant.
        #[max_length = 255]
        tenant_id -> Varchar,
        /// Notification payload.
        payload -> Jsonb,
        /// Failed delivery attempts.
        attempts -> Int4,
        /// Error from the latest failed attempt.
        last_error -> Nullable<Text>,
        /// Enqueue timestamp.
        enqueued_at -> Timestamptz,
        /// Delivery timestamp, null while pending.
        delivered_at -> Nullable<Timestamptz>,
    }
}
