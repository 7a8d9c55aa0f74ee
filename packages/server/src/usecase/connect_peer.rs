//! UseCase: 接続受付（Connection Gate）とロール割り当て（Role Arbiter）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - connect_peer(): トークン認証、state_sync の送信、ロールごとの登録
//!
//! ### なぜこのテストが必要か
//! - 共有シークレットと一致しない接続を確実に切断する
//! - host は viewer が許可したときだけ接続できることを保証する
//! - シークレット未設定時は意図的に全接続を受け付ける（fail-open）
//!
//! ### どのような状況を想定しているか
//! - 正常系：viewer / host の接続
//! - 異常系：トークン不一致、host ゲートが閉じている、未知のロール
//! - エッジケース：host の二重接続（後から来た host が置き換える）

use crate::{
    domain::{ConnectionId, PusherChannel, Role},
    infrastructure::dto::websocket::ServerEvent,
};

use super::{
    context::RelayContext,
    error::{GateError, HOST_NOT_ENABLED_MESSAGE},
    relay_command::flush_queue,
};

/// Notice sent to a host that has been replaced by a newer host connection
pub const HOST_REPLACED_MESSAGE: &str = "Another host connection took over";

/// Handshake payload presented when the channel opens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub token: Option<String>,
    pub role: Option<String>,
}

/// Compare the presented token against the configured secret.
///
/// With no secret configured every token, including none, is accepted.
pub fn authenticate(access_code: Option<&str>, token: Option<&str>) -> Result<(), GateError> {
    match access_code {
        None => Ok(()),
        Some(expected) if token == Some(expected) => Ok(()),
        Some(_) => Err(GateError::AuthFailure),
    }
}

/// 新しい接続を受け付ける
///
/// 1. 認証に失敗したら `auth_result {success:false}` を送って切断
/// 2. 成功したら `auth_result {success:true}` と `state_sync` を送信
/// 3. 宣言されたロールで Role Arbiter に登録
///
/// # Returns
///
/// * `Ok(Role)` - 登録されたロール
/// * `Err(GateError)` - 接続は既に切断済み
pub fn connect_peer(
    ctx: &mut RelayContext,
    id: ConnectionId,
    handshake: Handshake,
    channel: PusherChannel,
) -> Result<Role, GateError> {
    ctx.pusher.register_client(id, channel);

    if let Err(e) = authenticate(ctx.config.access_code.as_deref(), handshake.token.as_deref()) {
        tracing::warn!("Connection '{}' failed authentication", id);
        ctx.terminate(&id, &e.to_string());
        return Err(e);
    }

    ctx.send(&id, &ServerEvent::auth_success());
    ctx.send(&id, &ServerEvent::StateSync((&ctx.state).into()));

    // Legacy dashboards omit the role entirely
    let role = match handshake.role.as_deref().map(str::parse::<Role>) {
        None => Role::Viewer,
        Some(Ok(role)) => role,
        Some(Err(reason)) => {
            ctx.terminate(&id, &reason);
            return Err(GateError::RoleRejected(reason));
        }
    };

    match role {
        Role::Viewer => join_viewer(ctx, id)?,
        Role::Host => attach_host(ctx, id)?,
    }
    tracing::info!("Connection '{}' joined as {}", id, role);
    Ok(role)
}

fn join_viewer(ctx: &mut RelayContext, id: ConnectionId) -> Result<(), GateError> {
    if let Err(e) = ctx.registry.join_viewer(id) {
        ctx.terminate(&id, &e.to_string());
        return Err(e.into());
    }
    ctx.send(
        &id,
        &ServerEvent::HostAllowedStatus {
            allowed: ctx.state.host_allowed,
        },
    );
    Ok(())
}

fn attach_host(ctx: &mut RelayContext, id: ConnectionId) -> Result<(), GateError> {
    if !ctx.state.host_allowed {
        tracing::warn!("Host '{}' rejected: host gate is closed", id);
        ctx.terminate(&id, HOST_NOT_ENABLED_MESSAGE);
        return Err(GateError::RoleRejected(HOST_NOT_ENABLED_MESSAGE.to_string()));
    }

    let previous = match ctx.registry.attach_host(id) {
        Ok(previous) => previous,
        Err(e) => {
            ctx.terminate(&id, &e.to_string());
            return Err(e.into());
        }
    };
    if let Some(previous) = previous {
        // The replaced socket stays open but no longer hears from the relay
        tracing::warn!("Host '{}' replaced by '{}'", previous, id);
        ctx.send(&previous, &ServerEvent::error(HOST_REPLACED_MESSAGE));
    }

    ctx.state.host_connected = true;
    ctx.broadcast_all(&ServerEvent::HostStatus { connected: true });
    flush_queue(ctx, &id);
    Ok(())
}
