//! Wiring between the milter protocol and the [`Resolver`].

use std::{
    ffi::{CStr, CString},
    sync::Arc,
};

use async_trait::async_trait;
use indymilter::{
    Actions, Callbacks, Config, Context, ContextActions, EomActions, EomContext, Status,
};
use milter_alias_common::{AddressSet, incoming, internal, outgoing};
use milter_alias_directory::Directory;

use crate::{
    FilterError,
    resolver::{Resolver, Verdict},
    state::TransactionId,
};

pub const FILTER_NAME: &str = "milter-alias";

/// Set by the MTA once the client has authenticated.
const AUTH_ACCOUNT: &CStr = c"{auth_authen}";

impl From<Verdict> for Status {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Continue => Self::Continue,
            Verdict::TemporaryFailure => Self::Tempfail,
        }
    }
}

/// The only thing this filter ever asks of the MTA is to add recipients.
pub fn config() -> Config {
    Config {
        actions: Actions::ADD_RCPT,
        ..Default::default()
    }
}

pub fn callbacks<D: Directory + 'static>(resolver: &Arc<Resolver<D>>) -> Callbacks<TransactionId> {
    let on_mail = Arc::clone(resolver);
    let on_eom = Arc::clone(resolver);
    let on_abort = Arc::clone(resolver);
    let on_close = Arc::clone(resolver);

    Callbacks::new()
        .on_mail(move |context, args| {
            let resolver = Arc::clone(&on_mail);
            Box::pin(async move { handle_mail(&resolver, context, &args) })
        })
        .on_eom(move |context| {
            let resolver = Arc::clone(&on_eom);
            Box::pin(async move { handle_eom(&resolver, context).await })
        })
        .on_abort(move |context| {
            let resolver = Arc::clone(&on_abort);
            Box::pin(async move {
                discard(&resolver, context);
                Status::Continue
            })
        })
        .on_close(move |context| {
            let resolver = Arc::clone(&on_close);
            Box::pin(async move {
                discard(&resolver, context);
                Status::Continue
            })
        })
}

fn handle_mail<D: Directory>(
    resolver: &Resolver<D>,
    context: &mut Context<TransactionId>,
    args: &[CString],
) -> Status {
    let id = *context.data.get_or_insert_with(TransactionId::new);
    let sender = args.first().map_or(&b""[..], |sender| sender.as_bytes());
    let account = context.macros.get(AUTH_ACCOUNT).map(CStr::to_bytes);

    incoming!(
        "[{id}] MAIL FROM:{} {}={}",
        String::from_utf8_lossy(sender),
        AUTH_ACCOUNT.to_string_lossy(),
        account.map_or_else(|| "<none>".into(), String::from_utf8_lossy)
    );

    resolver.on_sender(id, sender, account).into()
}

async fn handle_eom<D: Directory>(
    resolver: &Resolver<D>,
    context: &mut EomContext<TransactionId>,
) -> Status {
    let Some(id) = context.data else {
        return Status::Continue;
    };

    let resolution = resolver.on_end_of_transaction(id).await;

    add_recipients(id, &resolution.recipients, &mut context.actions).await;

    resolution.verdict.into()
}

/// Where the recipients of a resolution are sent.
#[async_trait]
trait RecipientSink: Send {
    async fn add(&mut self, recipient: CString) -> Result<(), String>;
}

#[async_trait]
impl RecipientSink for EomActions {
    async fn add(&mut self, recipient: CString) -> Result<(), String> {
        ContextActions::add_recipient(self, recipient)
            .await
            .map_err(|err| err.to_string())
    }
}

/// Hands every recipient to `sink`, in order. A recipient that cannot be
/// added is logged and skipped. Returns how many were added.
async fn add_recipients<S: RecipientSink + ?Sized>(
    id: TransactionId,
    recipients: &AddressSet,
    sink: &mut S,
) -> usize {
    let mut added = 0;

    for recipient in recipients {
        let outcome = match recipient_name(recipient) {
            Ok(name) => sink.add(name).await.map_err(|reason| FilterError::Action {
                recipient: String::from_utf8_lossy(recipient).into_owned(),
                reason,
            }),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                added += 1;
                outgoing!(
                    level = INFO,
                    "[{id}] Added recipient {}",
                    String::from_utf8_lossy(recipient)
                );
            }
            Err(err) => internal!(level = ERROR, "[{id}] {err}"),
        }
    }

    added
}

fn discard<D: Directory>(resolver: &Resolver<D>, context: &Context<TransactionId>) {
    if let Some(id) = context.data {
        resolver.on_abort(id);
    }
}

/// Recipients cross the milter wire as C strings.
fn recipient_name(recipient: &[u8]) -> Result<CString, FilterError> {
    CString::new(recipient)
        .map_err(|_| FilterError::NulInRecipient(String::from_utf8_lossy(recipient).into_owned()))
}
