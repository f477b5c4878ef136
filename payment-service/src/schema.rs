diesel::table! {
    payment_intents (id) {
        id -> Uuid,
        user_id -> Uuid,
        salon_id -> Nullable<Uuid>,
        appointment_id -> Nullable<Uuid>,
        payment_method_id -> Nullable<Uuid>,
        amount -> Int8,
        currency -> Varchar,
        discount_amount -> Int8,
        payable_amount -> Int8,
        platform_fee_amount -> Int8,
        provider_fee_amount -> Int8,
        net_amount -> Int8,
        applied_discount_tier -> Nullable<Varchar>,
        provider -> Varchar,
        provider_ref -> Nullable<Varchar>,
        provider_data -> Nullable<Jsonb>,
        status -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    loyalty_accounts (id) {
        id -> Uuid,
        user_id -> Uuid,
        tier -> Varchar,
        current_points -> Int8,
        lifetime_points -> Int8,
        pending_discount_amount -> Int8,
        pending_discount_tier -> Nullable<Varchar>,
        pending_discount_issued_at -> Nullable<Timestamptz>,
        pending_discount_consumed_at -> Nullable<Timestamptz>,
        pending_discount_consumed_intent_id -> Nullable<Uuid>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    loyalty_transactions (id) {
        id -> Uuid,
        loyalty_account_id -> Uuid,
        delta_points -> Int8,
        reason -> Varchar,
        meta -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    appointments (id) {
        id -> Uuid,
        status -> Varchar,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    payment_methods (id) {
        id -> Uuid,
        user_id -> Uuid,
        provider -> Varchar,
        is_active -> Bool,
    }
}

diesel::joinable!(loyalty_transactions -> loyalty_accounts (loyalty_account_id));

diesel::allow_tables_to_appear_in_same_query!(
    payment_intents,
    loyalty_accounts,
    loyalty_transactions,
    appointments,
    payment_methods,
);
