//! Security group lifecycle scenarios

use super::{Scenario, check, check_eq, expect_conflict};
use crate::api::{ComputeApi, RebootType};
use crate::error::Result;
use crate::harness::Harness;
use compute_smoke_common::{ServerStatus, Service, Tag};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use tracing::info;

const NETWORK: &[Service] = &[Service::Network];

pub(super) fn scenarios<C: ComputeApi>() -> Vec<Scenario<C>> {
    vec![
        Scenario {
            name: "security_groups_create_list_delete",
            description: "Created groups appear in listings and vanish after deletion",
            tags: &[Tag::Smoke],
            services: NETWORK,
            run: create_list_delete::<C>,
        },
        Scenario {
            name: "security_group_create_get_delete",
            description: "A whitespace-padded name round-trips and get matches create",
            tags: &[Tag::Smoke],
            services: NETWORK,
            run: create_get_delete::<C>,
        },
        Scenario {
            name: "server_security_groups",
            description: "Groups attached to an active server cannot be deleted until it terminates",
            tags: &[Tag::Smoke, Tag::Slow],
            services: NETWORK,
            run: server_security_groups::<C>,
        },
        Scenario {
            name: "update_security_groups",
            description: "Name and description updates persist exactly",
            tags: &[Tag::Smoke],
            services: NETWORK,
            run: update_security_groups::<C>,
        },
    ]
}

fn create_list_delete<C: ComputeApi>(h: &Harness<C>) -> LocalBoxFuture<'_, Result<()>> {
    async move {
        let mut groups = Vec::with_capacity(3);
        for _ in 0..3 {
            groups.push(h.create_security_group(None, None).await?);
        }

        let listed = h.list_security_groups().await?;
        for group in &groups {
            check(
                listed.iter().any(|g| g.id == group.id),
                format!("security group {} missing from listing", group.id),
            )?;
        }

        for group in &groups {
            h.delete_security_group(&group.id).await?;
        }

        let listed = h.list_security_groups().await?;
        for group in &groups {
            check(
                listed.iter().all(|g| g.id != group.id),
                format!("deleted security group {} still listed", group.id),
            )?;
        }
        Ok(())
    }
    .boxed_local()
}

fn create_get_delete<C: ComputeApi>(h: &Harness<C>) -> LocalBoxFuture<'_, Result<()>> {
    async move {
        // Leading, trailing and internal whitespace
        let name = format!(" {} ", h.rand_name("securitygroup "));
        let group = h.create_security_group(Some(name.as_str()), None).await?;
        check_eq(group.name.as_str(), name.as_str(), "created security group name")?;

        let fetched = h.get_security_group(&group.id).await?;
        check_eq(&fetched, group.inner(), "fetched security group")?;

        h.delete_security_group(&group.id).await
    }
    .boxed_local()
}

fn server_security_groups<C: ComputeApi>(h: &Harness<C>) -> LocalBoxFuture<'_, Result<()>> {
    async move {
        let first = h.create_security_group(None, None).await?;
        let second = h.create_security_group(None, None).await?;

        let server = h.create_server(None).await?;
        h.wait_for_status(&server.id, ServerStatus::Active, None)
            .await?;

        h.attach_security_group(&server.id, &first.name).await?;
        expect_conflict(
            h.delete_security_group(&first.id).await,
            "deleting a security group attached to an active server",
        )?;

        h.reboot_server(&server.id, RebootType::Hard).await?;
        h.wait_for_status(&server.id, ServerStatus::Active, None)
            .await?;

        h.attach_security_group(&server.id, &second.name).await?;
        expect_conflict(
            h.delete_security_group(&second.id).await,
            "deleting a security group attached to a rebooted server",
        )?;

        h.delete_server(&server.id).await?;
        info!(server_id = %server.id, "Server gone, groups should now be deletable");

        h.delete_security_group(&first.id).await?;
        h.delete_security_group(&second.id).await
    }
    .boxed_local()
}

fn update_security_groups<C: ComputeApi>(h: &Harness<C>) -> LocalBoxFuture<'_, Result<()>> {
    async move {
        let group = h.create_security_group(None, None).await?;

        let new_name = h.rand_name("sg-hth");
        let new_description = h.rand_name("description-hth");
        let updated = h
            .update_security_group(
                &group.id,
                Some(new_name.as_str()),
                Some(new_description.as_str()),
            )
            .await?;
        check_eq(updated.name.as_str(), new_name.as_str(), "updated name")?;

        let fetched = h.get_security_group(&group.id).await?;
        check_eq(fetched.name.as_str(), new_name.as_str(), "fetched name")?;
        check_eq(
            fetched.description.as_str(),
            new_description.as_str(),
            "fetched description",
        )?;
        // Group is left to the guard; the cleanup executor deletes it
        Ok(())
    }
    .boxed_local()
}
